//! Route table and the authentication gate in front of protected routes.

use std::fmt;

use crate::session::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/`, always redirected to the dashboard
    Root,
    SignIn,
    SignUp,
    Dashboard,
    /// Anything not in the table
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = trimmed.trim_end_matches('/');
        match trimmed {
            "" => Route::Root,
            "/signin" => Route::SignIn,
            "/signup" => Route::SignUp,
            "/dashboard" => Route::Dashboard,
            _ => Route::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::SignIn => "/signin",
            Route::SignUp => "/signup",
            Route::Dashboard => "/dashboard",
            Route::NotFound => "*",
        }
    }

    /// Whether the route needs an authenticated session.
    pub fn is_protected(self) -> bool {
        matches!(self, Route::Dashboard)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of resolving a route against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
    /// Session status is still being determined
    Loading,
}

/// Decides what to show for `route` given the session status.
pub fn resolve(route: Route, status: SessionStatus) -> Navigation {
    match route {
        Route::Root | Route::NotFound => Navigation::Redirect(Route::Dashboard),
        Route::SignIn | Route::SignUp => Navigation::Render(route),
        Route::Dashboard => guard(route, status),
    }
}

fn guard(route: Route, status: SessionStatus) -> Navigation {
    match status {
        SessionStatus::Unknown => Navigation::Loading,
        SessionStatus::Authenticated => Navigation::Render(route),
        SessionStatus::Unauthenticated => Navigation::Redirect(Route::SignIn),
    }
}

/// Follows redirects until a route renders or the session is still loading.
pub fn navigate(path: &str, status: SessionStatus) -> Navigation {
    let mut route = Route::parse(path);
    // The table has no redirect chain longer than two hops.
    for _ in 0..3 {
        match resolve(route, status) {
            Navigation::Redirect(next) => route = next,
            other => return other,
        }
    }
    Navigation::Redirect(route)
}
