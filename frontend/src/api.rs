use chatbot_ui::models::{
    decode_messages, ConversationSummary, DocumentRecord, Message, RagQueryRequest,
    RagQueryResponse,
};
use chatbot_ui::{ChatApi, ClientError, Endpoints, RagApi, Result, UploadSource};
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use wasm_bindgen::JsValue;
use web_sys::{File, FormData};

/// Conversation endpoints of the chat backend.
pub struct HttpChatApi {
    endpoints: Endpoints,
}

impl HttpChatApi {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }
}

impl ChatApi for HttpChatApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let resp = checked(Request::get(&self.endpoints.conversations()).send().await).await?;
        json(resp).await
    }

    async fn generate_chat_id(&self) -> Result<String> {
        let resp = checked(Request::get(&self.endpoints.generate_chat_id()).send().await).await?;
        text(resp).await
    }

    async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let resp = checked(Request::get(&self.endpoints.messages(chat_id)).send().await).await?;
        let body = text(resp).await?;
        decode_messages(&body).map_err(|e| ClientError::decode(e.to_string()))
    }

    async fn delete_conversation(&self, chat_id: &str) -> Result<()> {
        checked(Request::delete(&self.endpoints.messages(chat_id)).send().await).await?;
        Ok(())
    }
}

/// A file picked in the documents panel.
pub struct FileUpload(pub File);

impl UploadSource for FileUpload {
    fn file_name(&self) -> String {
        self.0.name()
    }

    fn size(&self) -> u64 {
        self.0.size() as u64
    }

    fn content_type(&self) -> Option<String> {
        Some(self.0.type_()).filter(|t| !t.is_empty())
    }
}

/// Document and question endpoints of the RAG backend.
pub struct HttpRagApi {
    endpoints: Endpoints,
}

impl HttpRagApi {
    pub fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }
}

impl RagApi for HttpRagApi {
    type Upload = FileUpload;

    async fn upload_document(&self, file: &FileUpload) -> Result<DocumentRecord> {
        let form = FormData::new().map_err(js_error)?;
        form.append_with_blob_and_filename("file", &file.0, &file.0.name())
            .map_err(js_error)?;

        let request = Request::post(&self.endpoints.upload_document())
            .body(form)
            .map_err(|e| ClientError::transport(e.to_string()))?;
        let resp = checked(request.send().await).await?;
        json(resp).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let resp = checked(Request::get(&self.endpoints.documents()).send().await).await?;
        json(resp).await
    }

    async fn delete_document(&self, id: i64) -> Result<()> {
        checked(Request::delete(&self.endpoints.document(id)).send().await).await?;
        Ok(())
    }

    async fn query(&self, request: &RagQueryRequest) -> Result<RagQueryResponse> {
        let request = Request::post(&self.endpoints.query())
            .json(request)
            .map_err(|e| ClientError::decode(e.to_string()))?;
        let resp = checked(request.send().await).await?;
        json(resp).await
    }
}

/// Maps transport failures and non-2xx statuses to `ClientError`.
async fn checked(sent: std::result::Result<Response, gloo_net::Error>) -> Result<Response> {
    let resp = sent.map_err(|e| ClientError::transport(e.to_string()))?;
    if resp.ok() {
        return Ok(resp);
    }

    let status = resp.status();
    let fallback = resp.status_text();
    let body = resp.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or(fallback);
    log::error!("{} returned {status}: {message}", resp.url());
    Err(ClientError::server(status, message))
}

/// Error bodies are either `{"message": "..."}` or plain text.
fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string),
        Err(_) => Some(body.to_string()),
    }
}

async fn json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::decode(e.to_string()))
}

async fn text(resp: Response) -> Result<String> {
    resp.text()
        .await
        .map(|t| t.trim().to_string())
        .map_err(|e| ClientError::decode(e.to_string()))
}

fn js_error(e: JsValue) -> ClientError {
    ClientError::transport(format!("{e:?}"))
}
