mod message;
mod request;
mod response;

pub use message::Message;
pub use request::HttpRequest;
pub use response::HttpResponse;
