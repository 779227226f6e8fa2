//! Role-gated navigation.
//!
//! Everything here is a pure function of the session and the requested view, so
//! callers evaluate it on every navigation attempt and on every session change
//! instead of caching a decision.

use crate::session::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Login,
    Admin,
    Chat,
}

impl View {
    /// `None` means public. `Some(&[])` would mean nobody, which no view uses.
    pub fn allowed_roles(&self) -> Option<&'static [Role]> {
        match self {
            View::Login => None,
            View::Admin => Some(&[Role::Admin]),
            View::Chat => Some(Role::all()),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Login => "Login",
            View::Admin => "Admin Dashboard",
            View::Chat => "Chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(View),
}

/// Decide whether `session` may enter a view guarded by `allowed_roles`.
///
/// A guarded view always needs a session; a public one (`None`) never does.
/// A role outside the allowed set is sent back to login rather than to a
/// dedicated forbidden view.
pub fn authorize(session: Option<&Session>, allowed_roles: Option<&[Role]>) -> Access {
    let Some(allowed) = allowed_roles else {
        return Access::Allow;
    };
    match session {
        None => Access::Redirect(View::Login),
        Some(s) if allowed.contains(&s.role()) => Access::Allow,
        Some(_) => Access::Redirect(View::Login),
    }
}

/// The view actually shown when `requested` is asked for.
pub fn navigate(requested: View, session: Option<&Session>) -> View {
    match authorize(session, requested.allowed_roles()) {
        Access::Allow => requested,
        Access::Redirect(target) => target,
    }
}

/// Where a fresh login lands.
pub fn landing_view(role: Role) -> View {
    match role {
        Role::Admin => View::Admin,
        Role::User => View::Chat,
    }
}

/// Navigation links offered to the current session, in display order.
pub fn nav_links(session: Option<&Session>) -> Vec<View> {
    [View::Admin, View::Chat]
        .into_iter()
        .filter(|view| session.is_some() && authorize(session, view.allowed_roles()) == Access::Allow)
        .collect()
}
