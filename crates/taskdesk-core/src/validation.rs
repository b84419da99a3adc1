//! Form validation run before anything reaches the network.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use taskdesk_types::CreateTaskPayload;

const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 100;
const TITLE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
        .expect("email pattern compiles")
});

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// All field errors of a form, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    fn check(&mut self, field: &'static str, result: Result<(), &'static str>) {
        if let Err(message) = result {
            self.push(field, message);
        }
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// `Ok` when `errors` is empty.
    ///
    /// # Errors
    /// Returns the collected errors otherwise.
    pub fn from_errors(errors: Vec<FieldError>) -> Result<(), ValidationErrors> {
        Self { errors }.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message recorded for `field`.
    pub fn message_for(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Checks an email address the way the sign-in and sign-up forms do.
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

fn email(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        Err("Email is required")
    } else if !is_valid_email(value) {
        Err("Invalid email address")
    } else {
        Ok(())
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    /// # Errors
    /// Returns every rejected field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check("email", email(&self.email));
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    /// # Errors
    /// Returns every rejected field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name_len = char_len(&self.name);
        if name_len == 0 {
            errors.push("name", "Name is required");
        } else if name_len > NAME_MAX {
            errors.push("name", "Name must be less than 50 characters");
        }

        errors.check("email", email(&self.email));

        let password_len = char_len(&self.password);
        if password_len < PASSWORD_MIN {
            errors.push("password", "Password must be at least 6 characters");
        } else if password_len > PASSWORD_MAX {
            errors.push("password", "Password must be less than 100 characters");
        }

        errors.into_result()
    }
}

/// Task creation form. An empty description means "no description".
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
}

impl TaskForm {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description: description.unwrap_or_default(),
        }
    }

    /// # Errors
    /// Returns every rejected field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check("title", validate_title(&self.title));
        errors.check("description", validate_description(&self.description));
        errors.into_result()
    }

    /// Validates and converts into the request body.
    ///
    /// # Errors
    /// Returns every rejected field.
    pub fn into_payload(self) -> Result<CreateTaskPayload, ValidationErrors> {
        self.validate()?;
        Ok(CreateTaskPayload {
            title: self.title,
            description: (!self.description.is_empty()).then_some(self.description),
        })
    }
}

/// Title rule shared by creation and edits.
///
/// # Errors
/// Returns the user-facing message.
pub fn validate_title(title: &str) -> Result<(), &'static str> {
    let len = char_len(title);
    if len == 0 {
        Err("Title is required")
    } else if len > TITLE_MAX {
        Err("Title must be less than 100 characters")
    } else {
        Ok(())
    }
}

/// Description rule shared by creation and edits.
///
/// # Errors
/// Returns the user-facing message.
pub fn validate_description(description: &str) -> Result<(), &'static str> {
    if char_len(description) > DESCRIPTION_MAX {
        Err("Description must be less than 500 characters")
    } else {
        Ok(())
    }
}
