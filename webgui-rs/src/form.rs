//! Settings form handling
//!
//! A settings page posts `application/x-www-form-urlencoded` fields named
//! after variable aliases. Every field is applied through the variable
//! registry, so forms get exactly the validation the REST API gets. Writes are
//! memory only; the `sav=prs` field asks the caller to persist and reboot.

use std::borrow::Cow;

use log::{debug, warn};

use crate::error::VarError;
use crate::vars::VariableRegistry;

/// Field that carries a form action rather than a variable
pub const SAVE_FIELD: &str = "sav";

/// Value of [`SAVE_FIELD`] that requests a save
pub const SAVE_VALUE: &str = "prs";

/// Page the client is sent to after a save
pub const REBOOT_PAGE: &str = "/reboot.html";

/// Result of applying one form submission
#[derive(Debug, Default, PartialEq)]
pub struct FormOutcome {
    /// Aliases written successfully, in submission order
    pub applied: Vec<String>,
    /// Fields that were refused, with the reason
    pub rejected: Vec<(String, VarError)>,
    /// The submission asked for the configuration to be saved
    pub save_requested: bool,
}

impl FormOutcome {
    /// Where to send the client after the POST, if anywhere.
    ///
    /// Only a clean submission that asked for a save redirects; a form with
    /// rejected fields goes back to the user and is not persisted.
    pub fn redirect(&self) -> Option<&'static str> {
        (self.save_requested && self.is_clean()).then_some(REBOOT_PAGE)
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Field names that were refused, in submission order
    pub fn rejected_aliases(&self) -> Vec<&str> {
        self.rejected.iter().map(|(alias, _)| alias.as_str()).collect()
    }
}

/// Split a URL-encoded body into decoded `(key, value)` pairs.
///
/// `+` decodes to a space. Pairs whose key is empty are dropped; a key
/// without `=` gets an empty value.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = decode(parts.next().unwrap_or(""));
            let value = decode(parts.next().unwrap_or(""));
            (!key.is_empty()).then_some((key, value))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let spaced: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };
    match urlencoding::decode(&spaced) {
        Ok(v) => v.into_owned(),
        // Invalid UTF-8 after decoding: keep the raw text
        Err(_) => spaced.into_owned(),
    }
}

/// Apply a URL-encoded form body to `ctx` through `registry`.
///
/// A rejected field does not stop the remaining ones from being applied.
pub fn apply_form<C>(registry: &VariableRegistry<C>, ctx: &mut C, body: &str) -> FormOutcome {
    let mut outcome = FormOutcome::default();
    for (key, value) in parse_form(body) {
        if key == SAVE_FIELD {
            outcome.save_requested |= value == SAVE_VALUE;
            continue;
        }
        match registry.set(ctx, &key, &value) {
            Ok(_) => {
                debug!("Form field '{}' applied", key);
                outcome.applied.push(key);
            }
            Err(e) => {
                warn!("Form field '{}' rejected: {}", key, e);
                outcome.rejected.push((key, e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::status::DeviceState;
    use crate::vars::builtin_variables;

    fn setup() -> (VariableRegistry<DeviceState>, DeviceState) {
        let state = DeviceState::new(SystemConfig::default());
        (VariableRegistry::new(builtin_variables(&state.config.interfaces)), state)
    }

    #[test]
    fn test_parse_form_decoding() {
        let pairs = parse_form("wifissid=My+Home%21&empty=&flag&=orphan");
        assert_eq!(
            pairs,
            vec![
                ("wifissid".to_string(), "My Home!".to_string()),
                ("empty".to_string(), String::new()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_apply_without_save() {
        let (reg, mut state) = setup();
        let outcome = apply_form(&reg, &mut state, "netname=LAB-01&otaint=120");
        assert_eq!(outcome.applied, vec!["netname", "otaint"]);
        assert!(outcome.is_clean());
        assert_eq!(outcome.redirect(), None);
        assert_eq!(state.config.netname.as_str(), "LAB-01");
        assert_eq!(state.config.ota_interval, 120);
    }

    #[test]
    fn test_apply_with_save_redirects() {
        let (reg, mut state) = setup();
        let outcome = apply_form(&reg, &mut state, "ledenab=0&sav=prs");
        assert!(outcome.save_requested);
        assert_eq!(outcome.redirect(), Some("/reboot.html"));
        assert!(!state.config.leds_enabled);
    }

    #[test]
    fn test_rejected_field_blocks_save() {
        let (reg, mut state) = setup();
        let outcome = apply_form(&reg, &mut state, "otaint=99999&sav=prs");
        assert!(outcome.save_requested);
        assert!(!outcome.is_clean());
        assert_eq!(outcome.redirect(), None);
        assert_eq!(outcome.rejected_aliases(), vec!["otaint"]);
        assert_eq!(state.config.ota_interval, 0);

        let outcome = apply_form(&reg, &mut state, "wifiip=-&netname=GOOD&otaint=99999&sav=prs");
        assert_eq!(outcome.redirect(), None);
        assert_eq!(outcome.rejected_aliases(), vec!["wifiip", "otaint"]);
    }

    #[test]
    fn test_other_action_value_is_not_save() {
        let (reg, mut state) = setup();
        let outcome = apply_form(&reg, &mut state, "sav=nope");
        assert!(!outcome.save_requested);
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn test_rejected_fields_do_not_block_others() {
        let (reg, mut state) = setup();
        let outcome = apply_form(&reg, &mut state, "otaint=99999&netname=GOOD&bogus=1");
        assert_eq!(outcome.applied, vec!["netname"]);
        assert_eq!(outcome.rejected.len(), 2);
        assert!(matches!(outcome.rejected[0].1, VarError::InvalidArgument { .. }));
        assert_eq!(outcome.rejected[1].1, VarError::NotFound("bogus".to_string()));
        assert_eq!(state.config.ota_interval, 0);
    }

    #[test]
    fn test_masked_password_resubmit() {
        let (reg, mut state) = setup();
        apply_form(&reg, &mut state, "syspass=s3cret");
        let outcome = apply_form(&reg, &mut state, "syspass=%2A%2A%2A%2A%2A%2A%2A%2A&sysname=root");
        assert!(outcome.is_clean());
        assert_eq!(state.config.syspass.as_str(), "s3cret");
        assert_eq!(state.config.sysname.as_str(), "root");
    }

    #[test]
    fn test_checkbox_hidden_fallback() {
        // Unchecked boxes only submit the hidden "0"; checked ones submit "0" then "1"
        let (reg, mut state) = setup();
        apply_form(&reg, &mut state, "ledenab=0");
        assert!(!state.config.leds_enabled);
        apply_form(&reg, &mut state, "ledenab=0&ledenab=1");
        assert!(state.config.leds_enabled);
    }
}
