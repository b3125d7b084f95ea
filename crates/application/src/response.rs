use http::StatusCode;
use serde_json::{Map, Value};

/// Response produced by actions and getters.
///
/// Named constructors cover the statuses handlers commonly return; the body is a JSON object
/// assembled through the chained setters.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    status: StatusCode,
    body: Map<String, Value>,
}

impl RestResponse {
    /// Creates a response with an explicit status.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            body: Map::new(),
        }
    }

    /// 200 OK.
    #[must_use]
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// 201 Created.
    #[must_use]
    pub fn created() -> Self {
        Self::with_status(StatusCode::CREATED)
    }

    /// 204 No Content.
    #[must_use]
    pub fn no_content() -> Self {
        Self::with_status(StatusCode::NO_CONTENT)
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::with_status(StatusCode::BAD_REQUEST)
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::with_status(StatusCode::FORBIDDEN)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::with_status(StatusCode::NOT_FOUND)
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn invalid() -> Self {
        Self::with_status(StatusCode::UNPROCESSABLE_ENTITY)
    }

    /// Sets `data`.
    #[must_use]
    pub fn data(self, data: Value) -> Self {
        self.set("data", data)
    }

    /// Sets `message`.
    #[must_use]
    pub fn message(self, message: impl Into<String>) -> Self {
        self.set("message", Value::String(message.into()))
    }

    /// Sets `errors`.
    #[must_use]
    pub fn errors(self, errors: Value) -> Self {
        self.set("errors", errors)
    }

    /// Sets an arbitrary top-level body key.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the JSON body.
    #[must_use]
    pub fn body(&self) -> Value {
        Value::Object(self.body.clone())
    }

    /// Consumes the response into its parts.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Value) {
        (self.status, Value::Object(self.body))
    }
}

impl Default for RestResponse {
    fn default() -> Self {
        Self::ok()
    }
}
