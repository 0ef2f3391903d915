//! Helpers for showing things to the user.

use crate::Role;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;

/// What [`format_date()`] renders when it can't make sense of its input.
pub const INVALID_DATE: &str = "Invalid Date";

/// Render a timestamp like `"Mar 5, 2024"`.
///
/// RFC 3339 timestamps are converted to UTC first. Naive timestamps (as the
/// server sends them) and plain `YYYY-MM-DD` dates are used as-is.
pub fn format_date(date: &str) -> String {
    match parse_date(date.trim()) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => String::from(INVALID_DATE),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Some(timestamp.with_timezone(&Utc).date_naive());
    }

    for format in &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
            return Some(timestamp.date());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// The CSS class used for a role's badge, or an empty string for roles we
/// don't recognise.
pub fn role_badge_class(role: &str) -> &'static str {
    match role.parse::<Role>() {
        Ok(Role::Admin) => "admin-badge",
        Ok(Role::Developer) => "developer-badge",
        Ok(Role::Viewer) => "viewer-badge",
        Err(_) => "",
    }
}

/// Something on the page which can display a message.
pub trait Element {
    fn set_text(&mut self, text: &str);
    fn set_visible(&mut self, visible: bool);
}

/// A way to look up [`Element`]s by their identifier.
pub trait Document {
    fn find_by_id(&mut self, id: &str) -> Option<&mut dyn Element>;
}

/// Show an error message in the element with this `id`, if there is one.
pub fn show_error<D: Document + ?Sized>(
    doc: &mut D,
    id: &str,
    message: &str,
) {
    show(doc, id, message);
}

/// Empty and hide the element with this `id`, if there is one.
pub fn clear_error<D: Document + ?Sized>(doc: &mut D, id: &str) {
    if let Some(element) = doc.find_by_id(id) {
        element.set_text("");
        element.set_visible(false);
    }
}

/// Show a success message in the element with this `id`, if there is one.
pub fn show_success<D: Document + ?Sized>(
    doc: &mut D,
    id: &str,
    message: &str,
) {
    show(doc, id, message);
}

fn show<D: Document + ?Sized>(doc: &mut D, id: &str, message: &str) {
    if let Some(element) = doc.find_by_id(id) {
        element.set_text(message);
        element.set_visible(true);
    }
}

/// A [`Document`] which keeps everything in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryDocument {
    elements: HashMap<String, MemoryElement>,
}

impl MemoryDocument {
    pub fn new() -> Self { MemoryDocument::default() }

    /// Add a hidden, empty element (replacing any existing one).
    pub fn insert(&mut self, id: impl Into<String>) -> &mut MemoryElement {
        let slot = self.elements.entry(id.into()).or_default();
        *slot = MemoryElement::default();
        slot
    }

    pub fn get(&self, id: &str) -> Option<&MemoryElement> {
        self.elements.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.elements.keys().map(|id| id.as_str())
    }
}

impl Document for MemoryDocument {
    fn find_by_id(&mut self, id: &str) -> Option<&mut dyn Element> {
        self.elements
            .get_mut(id)
            .map(|element| element as &mut dyn Element)
    }
}

/// An element in a [`MemoryDocument`]. Elements start off hidden.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryElement {
    pub text: String,
    pub visible: bool,
}

impl Element for MemoryElement {
    fn set_text(&mut self, text: &str) { self.text = text.to_string(); }

    fn set_visible(&mut self, visible: bool) { self.visible = visible; }
}
