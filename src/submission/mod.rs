pub mod http;
pub mod multipart;
pub mod pipeline;
pub mod services;
pub mod simulated;

pub use http::{HttpClient, HttpRequest, HttpResponse, HttpTokenService, HttpUploadService, UreqHttpClient};
pub use pipeline::{SubmissionPipeline, SubmissionReceipt};
pub use services::{
    ExerciseToken, SubmissionScope, TokenRequest, TokenResponse, TokenService, UploadResponse,
    UploadService,
};
pub use simulated::{ScriptedTokenService, ScriptedUploadService};
