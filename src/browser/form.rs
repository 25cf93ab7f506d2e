//! HTML form snapshots: fields, clickable controls and the submitted data set.

use scraper::ElementRef;
use tracing::debug;
use url::Url;

use super::page::Page;
use super::BrowserError;

/// HTTP method a form submits with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    /// Data goes in the query string.
    Get,
    /// Data goes in an `application/x-www-form-urlencoded` body.
    Post,
}

/// Kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line input: text, hidden, password, email, number and friends.
    Input,
    /// `<input type="checkbox">`.
    Checkbox,
    /// `<input type="radio">`.
    Radio,
    /// `<textarea>`.
    TextArea,
    /// `<select>`.
    Select,
}

impl FieldKind {
    fn is_checkable(self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

/// A named, enabled form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    /// Control name.
    pub name: String,
    /// Current value.
    pub value: String,
    /// Control kind.
    pub kind: FieldKind,
    /// Checked state; always `true` for non-checkable kinds.
    pub checked: bool,
}

/// Kind of a clickable form control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitterKind {
    /// `<input type="submit">`.
    Input,
    /// `<input type="image">`.
    Image,
    /// `<button>` with type `submit` (the default).
    Button,
    /// Any other `<input>`; clicking it leaves the page as it is.
    PlainInput,
    /// `<button type="button">` or `type="reset"`; clicking it leaves the
    /// page as it is.
    PlainButton,
}

impl SubmitterKind {
    /// Whether clicking a control of this kind submits its form.
    pub fn submits(self) -> bool {
        matches!(self, Self::Input | Self::Image | Self::Button)
    }
}

/// A clickable form control: an `<input>` or a `<button>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    /// Control name, if any.
    pub name: Option<String>,
    /// Control value.
    pub value: String,
    /// Control id, if any.
    pub id: Option<String>,
    /// Control kind.
    pub kind: SubmitterKind,
}

impl Submitter {
    /// Control described by `element`, or `None` if it is neither an
    /// `<input>` nor a `<button>`.
    pub fn from_element(element: ElementRef<'_>) -> Option<Self> {
        let el = element.value();
        let kind = match el.name() {
            "input" => match input_type(element).as_str() {
                "submit" => SubmitterKind::Input,
                "image" => SubmitterKind::Image,
                _ => SubmitterKind::PlainInput,
            },
            "button" => match el.attr("type").map(str::to_ascii_lowercase).as_deref() {
                None | Some("submit") => SubmitterKind::Button,
                Some(_) => SubmitterKind::PlainButton,
            },
            _ => return None,
        };
        Some(Self {
            name: el.attr("name").map(str::to_string),
            value: el.attr("value").unwrap_or_default().to_string(),
            id: el.id().map(str::to_string),
            kind,
        })
    }

    fn pairs(&self) -> Vec<(String, String)> {
        let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) else {
            return Vec::new();
        };
        match self.kind {
            SubmitterKind::Image => vec![
                (format!("{name}.x"), "0".to_string()),
                (format!("{name}.y"), "0".to_string()),
            ],
            SubmitterKind::Input | SubmitterKind::Button => {
                vec![(name.to_string(), self.value.clone())]
            }
            SubmitterKind::PlainInput | SubmitterKind::PlainButton => Vec::new(),
        }
    }
}

fn input_type(element: ElementRef<'_>) -> String {
    element
        .value()
        .attr("type")
        .unwrap_or("text")
        .trim()
        .to_ascii_lowercase()
}

fn is_disabled(element: ElementRef<'_>) -> bool {
    element.value().attr("disabled").is_some()
}

/// Snapshot of a `<form>` element that can be filled in and submitted.
///
/// Edits change the snapshot only; the page it was read from is untouched.
#[derive(Debug, Clone)]
pub struct Form {
    name: Option<String>,
    id: Option<String>,
    action: Url,
    method: FormMethod,
    fields: Vec<FormField>,
    controls: Vec<Submitter>,
    page: Page,
}

impl Form {
    /// Snapshot `element` of `page`, resolving its action against the page URL.
    ///
    /// A missing, empty or unresolvable action submits to the page URL.
    pub fn from_element(element: ElementRef<'_>, page: &Page) -> Self {
        let base = page.url();
        let el = element.value();
        let action = match el.attr("action").map(str::trim).filter(|a| !a.is_empty()) {
            Some(action) => base.join(action).unwrap_or_else(|e| {
                debug!(action, error = %e, "unresolvable form action, using page URL");
                base.clone()
            }),
            None => base.clone(),
        };
        let method = match el.attr("method") {
            Some(m) if m.trim().eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        };

        let mut fields = Vec::new();
        let mut controls = Vec::new();
        for element in element.descendants().filter_map(ElementRef::wrap) {
            if let Some(control) = Submitter::from_element(element) {
                let submits = control.kind.submits();
                if !is_disabled(element) {
                    controls.push(control);
                }
                if submits {
                    continue;
                }
            }
            if let Some(field) = field_from_element(element) {
                fields.push(field);
            }
        }

        Self {
            name: el.attr("name").map(str::to_string),
            id: el.id().map(str::to_string),
            action,
            method,
            fields,
            controls,
            page: page.clone(),
        }
    }

    /// Page the form was read from.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// `name` attribute, or an empty string.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// `id` attribute, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Resolved submission URL.
    pub fn action(&self) -> &Url {
        &self.action
    }

    /// Submission method.
    pub fn method(&self) -> FormMethod {
        self.method
    }

    /// Enabled, named controls in document order.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Enabled `<input>` and `<button>` controls in document order.
    pub fn controls(&self) -> &[Submitter] {
        &self.controls
    }

    /// Enabled controls that submit the form, in document order.
    pub fn submitters(&self) -> impl Iterator<Item = &Submitter> + '_ {
        self.controls.iter().filter(|c| c.kind.submits())
    }

    /// Value of the first field named `name`; for checkboxes and radios, of
    /// the first checked one.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.checked)
            .map(|f| f.value.as_str())
    }

    /// Set the value of the first non-checkable field named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::FieldNotFound`] if there is no such field.
    pub fn set_value(&mut self, name: &str, value: &str) -> Result<(), BrowserError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name && !f.kind.is_checkable())
            .ok_or_else(|| BrowserError::FieldNotFound {
                name: name.to_string(),
                form: self.name.clone().unwrap_or_default(),
            })?;
        field.value = value.to_string();
        Ok(())
    }

    /// Check or uncheck the checkbox or radio named `name` with `value`.
    ///
    /// Checking a radio unchecks the rest of its group.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::FieldNotFound`] if there is no such control.
    pub fn set_checked(&mut self, name: &str, value: &str, checked: bool) -> Result<(), BrowserError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name && f.value == value && f.kind.is_checkable())
            .ok_or_else(|| BrowserError::FieldNotFound {
                name: format!("{name}={value}"),
                form: self.name().to_string(),
            })?;

        let is_radio = self.fields.get(index).map(|f| f.kind) == Some(FieldKind::Radio);
        if is_radio && checked {
            for field in self
                .fields
                .iter_mut()
                .filter(|f| f.name == name && f.kind == FieldKind::Radio)
            {
                field.checked = false;
            }
        }
        if let Some(field) = self.fields.get_mut(index) {
            field.checked = checked;
        }
        Ok(())
    }

    /// `<input>` of any type whose `value` attribute is `value`.
    pub fn input_by_value(&self, value: &str) -> Option<&Submitter> {
        self.controls.iter().find(|c| {
            matches!(
                c.kind,
                SubmitterKind::Input | SubmitterKind::Image | SubmitterKind::PlainInput
            ) && c.value == value
        })
    }

    /// `<button>` of any type whose name is `name`.
    pub fn button_by_name(&self, name: &str) -> Option<&Submitter> {
        self.controls.iter().find(|c| {
            matches!(c.kind, SubmitterKind::Button | SubmitterKind::PlainButton)
                && c.name.as_deref() == Some(name)
        })
    }

    /// `<input>` or `<button>` whose id is `id`.
    pub fn submitter_by_id(&self, id: &str) -> Option<&Submitter> {
        self.controls.iter().find(|c| c.id.as_deref() == Some(id))
    }

    /// Name/value pairs submitted when `submitter` is clicked.
    pub fn data_set(&self, submitter: Option<&Submitter>) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .fields
            .iter()
            .filter(|f| f.checked)
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect();
        if let Some(submitter) = submitter {
            pairs.extend(submitter.pairs());
        }
        pairs
    }
}

fn field_from_element(control: ElementRef<'_>) -> Option<FormField> {
    let el = control.value();
    let name = el.attr("name").filter(|n| !n.is_empty())?.to_string();
    if is_disabled(control) {
        return None;
    }

    let (kind, value, checked) = match el.name() {
        "input" => match input_type(control).as_str() {
            "button" | "reset" | "file" => return None,
            "checkbox" => (
                FieldKind::Checkbox,
                el.attr("value").unwrap_or("on").to_string(),
                el.attr("checked").is_some(),
            ),
            "radio" => (
                FieldKind::Radio,
                el.attr("value").unwrap_or("on").to_string(),
                el.attr("checked").is_some(),
            ),
            _ => (
                FieldKind::Input,
                el.attr("value").unwrap_or_default().to_string(),
                true,
            ),
        },
        "textarea" => (FieldKind::TextArea, control.text().collect(), true),
        "select" => (FieldKind::Select, selected_option(control)?, true),
        _ => return None,
    };

    Some(FormField {
        name,
        value,
        kind,
        checked,
    })
}

/// Value of the selected option, or of the first option if none is selected.
fn selected_option(select: ElementRef<'_>) -> Option<String> {
    let options: Vec<ElementRef<'_>> = select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "option")
        .collect();
    let chosen = options
        .iter()
        .find(|o| o.value().attr("selected").is_some())
        .or_else(|| options.first())?;
    Some(match chosen.value().attr("value") {
        Some(value) => value.to_string(),
        None => super::normalize_space(&chosen.text().collect::<String>()),
    })
}
