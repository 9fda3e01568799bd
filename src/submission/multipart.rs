//! Minimal `multipart/form-data` encoder for the upload request

use uuid::Uuid;

const CRLF: &str = "\r\n";

pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::with_boundary(format!("recital-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("form-data; name=\"{}\"", escape(name)), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(CRLF.as_bytes());
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape(name),
            escape(file_name)
        );
        self.open_part(&disposition, Some(content_type));
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(CRLF.as_bytes());
        self
    }

    /// Header value for `Content-Type`
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Close the form and return `(content_type, body)`
    pub fn finish(mut self) -> (String, Vec<u8>) {
        let content_type = self.content_type();
        self.body
            .extend_from_slice(format!("--{}--{}", self.boundary, CRLF).as_bytes());
        (content_type, self.body)
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        let mut head = format!("--{}{}", self.boundary, CRLF);
        head.push_str(&format!("Content-Disposition: {}{}", disposition, CRLF));
        if let Some(content_type) = content_type {
            head.push_str(&format!("Content-Type: {}{}", content_type, CRLF));
        }
        head.push_str(CRLF);
        self.body.extend_from_slice(head.as_bytes());
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
