use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const TABLE: &str = "cities";

/// Municipalities are reference data: listed and linked, never edited here
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct City {
    pub code: String,
    pub name: String,
    pub state_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct State {
    pub code: String,
    pub name: String,
}

impl City {
    /// Display name, prefixed with the prefecture
    pub fn full_name(&self, state: Option<&State>) -> String {
        match state {
            Some(state) => format!("{} {}", state.name, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_state_name() {
        let city = City { code: "37201".to_string(), name: "高松市".to_string(), state_code: "37".to_string() };
        let state = State { code: "37".to_string(), name: "香川県".to_string() };
        assert_eq!(city.full_name(Some(&state)), "香川県 高松市");
        assert_eq!(city.full_name(None), "高松市");
    }
}
