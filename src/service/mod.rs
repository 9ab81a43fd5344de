pub mod chat_controller;
pub mod chat_service;
pub mod document_service;
