use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Sort direction for `order=` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_postgrest(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            let message = store_error_message(&error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", message),
                404 => anyhow!("Resource not found: {}", message),
                _ => anyhow!("{}", message),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// `GET /rest/v1/{table}?{filters}&order={column}.{dir}`
    pub async fn select(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: Option<(&str, SortOrder)>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut query_parts: Vec<String> = filters
            .iter()
            .map(|(column, condition)| format!("{}={}", column, condition))
            .collect();

        if let Some((column, direction)) = order {
            query_parts.push(format!("order={}.{}", column, direction.as_postgrest()));
        }

        let path = if query_parts.is_empty() {
            format!("/rest/v1/{}?select=*", table)
        } else {
            format!("/rest/v1/{}?select=*&{}", table, query_parts.join("&"))
        };

        self.request(Method::GET, &path, auth_token, None).await
    }

    /// Insert one row and return the stored representation.
    pub async fn insert(
        &self,
        table: &str,
        row: Value,
        auth_token: Option<&str>,
    ) -> Result<Value> {
        let path = format!("/rest/v1/{}", table);
        let result: Vec<Value> = self.request_with_headers(
            Method::POST,
            &path,
            auth_token,
            Some(row),
            Some(representation_headers()),
        ).await?;

        result.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert into {} returned no rows", table))
    }

    /// Patch the rows matching `id` plus any extra filters. Returns the updated
    /// rows, which is empty when no row matched.
    pub async fn update_by_id(
        &self,
        table: &str,
        id: &str,
        extra_filters: &[(&str, String)],
        changes: Value,
        auth_token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut path = format!("/rest/v1/{}?id=eq.{}", table, id);
        for (column, condition) in extra_filters {
            path.push_str(&format!("&{}={}", column, condition));
        }

        self.request_with_headers(
            Method::PATCH,
            &path,
            auth_token,
            Some(changes),
            Some(representation_headers()),
        ).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// PostgREST reports failures as `{"message": ..., "code": ...}`; fall back to
/// the raw body for anything else.
fn store_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{MockServer, Mock, ResponseTemplate};
    use wiremock::matchers::{method, path, query_param, header};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[test]
    fn test_store_error_message_prefers_message_field() {
        let body = r#"{"code":"23502","message":"null value in column \"patient_name\""}"#;
        assert_eq!(store_error_message(body), "null value in column \"patient_name\"");
        assert_eq!(store_error_message("gateway timeout"), "gateway timeout");
    }

    #[tokio::test]
    async fn test_select_builds_filters_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("status", "eq.pendiente"))
            .and(query_param("order", "date_time.asc"))
            .and(header("apikey", "test-anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server)
            .select(
                "appointments",
                &[("status", "eq.pendiente".to_string())],
                Some(("date_time", SortOrder::Ascending)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_propagates_store_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/prescriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "22P02",
                "message": "invalid input syntax"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .insert("prescriptions", json!({"patient_name": "Ana"}), Some("token"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "invalid input syntax");
    }

    #[tokio::test]
    async fn test_update_by_id_sends_bearer_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", "eq.42"))
            .and(query_param("status", "eq.pendiente"))
            .and(header("authorization", "Bearer staff-token"))
            .and(header("prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server)
            .update_by_id(
                "appointments",
                "42",
                &[("status", "eq.pendiente".to_string())],
                json!({"status": "completada"}),
                Some("staff-token"),
            )
            .await
            .unwrap();

        assert!(rows.is_empty());
    }
}
