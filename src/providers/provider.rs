pub trait OAuthProvider: Send + Sync {
    /// Short identifier used in routes, e.g. `/api/auth/<id>/callback`.
    fn id(&self) -> &'static str;
    fn authorize_url(&self) -> &'static str;
    fn default_scopes(&self) -> &'static [&'static str];

    /// Provider-recommended extras such as consent or offline-access flags.
    fn authorize_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn callback_path(&self) -> String {
        format!("/auth/{}/callback", self.id())
    }

    fn exchange_path(&self) -> String {
        format!("api/auth/{}/callback", self.id())
    }
}
