//! `vouch suites`: list the standard probe suites.

use anyhow::Result;

use crate::app::AppContext;

/// Run `vouch suites`.
///
/// # Errors
///
/// Returns an error if JSON rendering fails.
pub fn run(app: &AppContext) -> Result<()> {
    app.renderer().render_suites()
}
