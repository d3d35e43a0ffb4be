use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use std::time::Duration;

use super::{ClientError, GameApi};
use crate::geo::Coordinate;
use crate::models::{
    AuthResponse, CheckInRequest, CheckInResult, LeaderboardEntry, LocationView, LoginRequest, User,
    UserProgress,
};
use crate::progress::Badge;
use crate::utils::{ApiResponse, error_codes};

/// 基于 HTTP 的 [`GameApi`]，`base_url` 需包含 API 前缀，
/// 例如 `http://localhost:3000/api`
pub struct HttpGameApi {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpGameApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request = match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        // 错误响应也带有 {code, msg}
        let body: ApiResponse<T> = request.send().await?.json().await?;
        if body.code != error_codes::SUCCESS {
            return Err(ClientError::Api {
                code: body.code,
                msg: body.msg,
            });
        }
        body.resp_data.ok_or(ClientError::EmptyResponse)
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let request = self.client.post(self.url("/users/login")).json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let auth: AuthResponse = self.send(request).await?;
        self.set_token(Some(auth.token.clone()));
        Ok(auth)
    }

    async fn me(&self) -> Result<User, ClientError> {
        self.send(self.client.get(self.url("/users/me"))).await
    }

    async fn fetch_locations(
        &self,
        position: Option<Coordinate>,
    ) -> Result<Vec<LocationView>, ClientError> {
        let mut request = self.client.get(self.url("/locations"));
        if let Some(position) = position {
            request = request.query(&[("lat", position.lat), ("lng", position.lng)]);
        }
        self.send(request).await
    }

    async fn check_in(
        &self,
        location_id: &str,
        coordinates: Coordinate,
    ) -> Result<CheckInResult, ClientError> {
        let request = self.client.post(self.url("/checkins")).json(&CheckInRequest {
            location_id: location_id.to_string(),
            coordinates: Some(coordinates),
        });
        self.send(request).await
    }

    async fn fetch_user_stats(&self, user_id: &str) -> Result<UserProgress, ClientError> {
        self.send(self.client.get(self.url(&format!("/users/{user_id}/stats"))))
            .await
    }

    async fn fetch_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, ClientError> {
        let request = self
            .client
            .get(self.url("/leaderboard"))
            .query(&[("limit", limit)]);
        self.send(request).await
    }

    async fn fetch_badges(&self) -> Result<Vec<Badge>, ClientError> {
        self.send(self.client.get(self.url("/badges"))).await
    }
}
