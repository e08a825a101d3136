use crate::condition::Condition;
use crate::property::Properties;
use crate::xml::XmlElement;
use tracing::warn;

/// An action offered by a template, with optional enablement condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub text: Option<String>,
    pub icon: Option<String>,
    pub shortcut: Option<String>,
    pub condition: Option<Condition>,
    pub enabled: bool,
    /// Set once the condition has been evaluated; the remote form runs only
    /// on first display.
    pub evaluated: bool,
}

impl Command {
    pub(crate) fn from_element(element: &XmlElement) -> Option<Self> {
        let Some(name) = element.attr("name") else {
            warn!("action without name; skipping");
            return None;
        };
        let props = Properties::from_element(element);
        let condition = match props.get_str("condition") {
            Some(text) => match Condition::parse(text) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(action = name, error = %e, "ignoring unparsable condition");
                    None
                }
            },
            None => None,
        };
        Some(Self {
            name: name.to_string(),
            text: props.get_str("text").map(String::from),
            icon: props.get_str("icon").map(String::from),
            shortcut: props.get_str("shortcut").map(String::from),
            evaluated: condition.is_none(),
            enabled: props.get_bool("enabled").unwrap_or(true),
            condition,
        })
    }
}
