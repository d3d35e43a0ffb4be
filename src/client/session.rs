use super::{ClientError, GameApi, Observable, SubscriptionId};
use crate::models::User;

#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_admin: bool,
    /// 启动时为 true，直到确认登录状态
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            is_admin: false,
            loading: true,
            error: None,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Default)]
pub struct SessionStore {
    state: Observable<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.state.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    pub fn set_user(&self, user: Option<User>) {
        self.state.update(|s| {
            s.user = user;
            s.loading = false;
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.update(|s| s.loading = loading);
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.state.update(|s| s.error = Some(error));
    }

    pub fn clear_error(&self) {
        self.state.update(|s| s.error = None);
    }

    pub fn logout(&self) {
        self.state.set(SessionState {
            loading: false,
            ..SessionState::default()
        });
    }

    /// 登录后加载用户资料；失败时错误写入状态并返回
    pub async fn sign_in(
        &self,
        api: &dyn GameApi,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = async {
            let auth = api.login(email, password).await?;
            let user = api.me().await?;
            Ok::<_, ClientError>((auth, user))
        }
        .await;

        match result {
            Ok((auth, user)) => {
                tracing::debug!("Signed in as {}", user.user_id);
                self.state.update(|s| {
                    s.token = Some(auth.token);
                    s.is_admin = auth.is_admin;
                    s.user = Some(user);
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    ClientError::Api { msg, .. } => msg.clone(),
                    _ => "Could not sign in. Check your connection and try again.".to_string(),
                };
                self.state.update(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
                Err(e)
            }
        }
    }
}
