use reclaim_auth::Caller;
use reclaim_infra::continuation::ForwardedAuth;

/// Authenticated caller for a request.
///
/// Carries the original `Authorization` header so runs started by this
/// request can forward it to their continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    caller: Caller,
    authorization: ForwardedAuth,
}

impl CallerContext {
    pub fn new(caller: Caller, authorization: ForwardedAuth) -> Self {
        Self {
            caller,
            authorization,
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn authorization(&self) -> &ForwardedAuth {
        &self.authorization
    }
}
