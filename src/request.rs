//! Backend-specific request construction.
//!
//! A [`RequestBuilder`] turns a serialized payload plus a fresh
//! [`Credential`] into an [`OutboundRequest`]. The two gateways differ only in
//! how the token travels:
//! - Firebase: raw token in `X-Firebase-AppCheck`
//! - Supabase: `Authorization: Bearer <token>`

use crate::credential::Credential;
use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Header carrying the Firebase App Check token.
pub const APP_CHECK_HEADER: &str = "x-firebase-appcheck";

/// Body field carrying the secondary identifier on Supabase.
pub const USER_ID_FIELD: &str = "user_id";

/// Fully formed HTTP request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Request headers, including authentication.
    pub headers: HeaderMap,
    /// Serialized JSON body.
    pub body: Bytes,
    /// Request timeout.
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Decode the body back into JSON.
    pub fn json_body(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).map_err(Error::Decode)
    }
}

/// Builds an [`OutboundRequest`] with one backend's authentication scheme.
pub trait RequestBuilder: Send + Sync + std::fmt::Debug {
    /// Short backend name, for logs.
    fn name(&self) -> &'static str;

    /// Header that carries the token.
    fn auth_header(&self, token: &str) -> Result<(HeaderName, HeaderValue)>;

    /// Body fields derived from the credential, merged by [`build`](Self::build).
    fn extra_fields(&self, _credential: &Credential) -> Option<Map<String, Value>> {
        None
    }

    /// Assemble a `POST` with a JSON body and this backend's auth header.
    ///
    /// `extra_fields` are merged into the top level of `payload`,
    /// replacing keys that already exist.
    fn build(
        &self,
        payload: Value,
        url: &Url,
        credential: &Credential,
        timeout: Duration,
        extra_fields: Option<Map<String, Value>>,
    ) -> Result<OutboundRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let (name, value) = self.auth_header(credential.token())?;
        headers.insert(name, value);

        Ok(OutboundRequest {
            method: Method::POST,
            url: url.clone(),
            headers,
            body: encode_body(payload, extra_fields)?,
            timeout,
        })
    }
}

/// Serialize `payload` with `extra_fields` merged into its top-level object.
pub fn encode_body(mut payload: Value, extra_fields: Option<Map<String, Value>>) -> Result<Bytes> {
    if let Some(extra) = extra_fields.filter(|e| !e.is_empty()) {
        let Value::Object(object) = &mut payload else {
            return Err(Error::build(
                "extra fields can only be merged into a JSON object body",
            ));
        };
        object.extend(extra);
    }
    serde_json::to_vec(&payload)
        .map(Bytes::from)
        .map_err(Error::Encode)
}

fn header_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(token)
        .map_err(|e| Error::build(format!("credential is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Gateway A: token passed verbatim in `X-Firebase-AppCheck`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirebaseRequestBuilder;

impl RequestBuilder for FirebaseRequestBuilder {
    fn name(&self) -> &'static str {
        "firebase"
    }

    fn auth_header(&self, token: &str) -> Result<(HeaderName, HeaderValue)> {
        Ok((HeaderName::from_static(APP_CHECK_HEADER), header_value(token)?))
    }
}

/// Gateway B: standard bearer authorization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupabaseRequestBuilder;

impl RequestBuilder for SupabaseRequestBuilder {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn auth_header(&self, token: &str) -> Result<(HeaderName, HeaderValue)> {
        Ok((AUTHORIZATION, header_value(&format!("Bearer {token}"))?))
    }

    fn extra_fields(&self, credential: &Credential) -> Option<Map<String, Value>> {
        let user_id = credential.user_id()?;
        let mut fields = Map::new();
        fields.insert(USER_ID_FIELD.to_string(), Value::from(user_id));
        Some(fields)
    }
}
