use std::sync::Arc;

use tracing::debug;

use crate::dom::{DomEvent, EventKind, EventOutcome, NodeId, Page};

pub const INVALID_CLASS: &str = "is-invalid";
pub const VALID_CLASS: &str = "is-valid";
const REQUIRED_ATTR: &str = "required";

/// Flags every required field under `form`: blank ones invalid, the rest valid.
/// Returns true when no required field is blank.
pub fn validate(page: &Page, form: NodeId) -> bool {
    let mut ok = true;
    for field in page.descendants(form) {
        if !page.has_attribute(field, REQUIRED_ATTR) {
            continue;
        }
        let blank = page
            .value(field)
            .map(|v| v.trim().is_empty())
            .unwrap_or(true);
        if blank {
            page.remove_class(field, VALID_CLASS);
            page.add_class(field, INVALID_CLASS);
            ok = false;
        } else {
            page.remove_class(field, INVALID_CLASS);
            page.add_class(field, VALID_CLASS);
        }
    }
    ok
}

/// Validates `form` on every submit and blocks submission when it fails.
pub fn guard_submit(page: &Page, form: NodeId) -> bool {
    page.add_listener(
        form,
        "form-guard",
        EventKind::Submit,
        Arc::new(move |page: &Page, _: &DomEvent| {
            if validate(page, form) {
                EventOutcome::Continue
            } else {
                debug!("Submission blocked: required fields are empty");
                EventOutcome::PreventDefault
            }
        }),
    )
}
