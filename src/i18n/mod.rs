//! Message catalog for content-manager responses.

use axum::{async_trait, extract::FromRequestParts, http::header::ACCEPT_LANGUAGE, http::request::Parts};
use std::convert::Infallible;

use crate::types::{ContentType, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ja,
    En,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "ja" => Some(Locale::Ja),
            "en" => Some(Locale::En),
            _ => None,
        }
    }

    /// First supported language in an `Accept-Language` header, in listed order
    pub fn from_accept_language(header: &str) -> Option<Self> {
        header
            .split(',')
            .filter_map(|part| part.split(';').next())
            .find_map(Locale::from_tag)
    }

    pub fn configured_default() -> Self {
        Locale::from_tag(&crate::config::config().i18n.default_locale).unwrap_or_default()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Locale {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let fallback = Locale::configured_default();
        if !crate::config::config().i18n.enabled {
            return Ok(fallback);
        }
        Ok(parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Locale::from_accept_language)
            .unwrap_or(fallback))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    NoData,
    Failed(Operation),
    NotFound(ContentType, String),
    SlotRange,
    CityReadOnly(Operation),
}

impl Message {
    pub fn text(&self, locale: Locale) -> String {
        match locale {
            Locale::Ja => self.ja(),
            Locale::En => self.en(),
        }
    }

    fn ja(&self) -> String {
        match self {
            Message::NoData => "データが入力されていません。".to_string(),
            Message::Failed(Operation::Create) => "データの作成に失敗しました。".to_string(),
            Message::Failed(Operation::Update) => "データの更新に失敗しました。".to_string(),
            Message::Failed(Operation::Delete) => "データの削除に失敗しました。".to_string(),
            Message::NotFound(content_type, id) => {
                let noun = match content_type {
                    ContentType::Article => "記事",
                    ContentType::Community => "コミュニティ",
                    ContentType::Opportunity => "機会",
                    ContentType::OpportunitySlot => "日程",
                    ContentType::Place => "拠点",
                    ContentType::City => "市区町村",
                    ContentType::User => "ユーザー",
                };
                format!("該当する{}が見つかりませんでした: {}", noun, id)
            }
            Message::SlotRange => "開始日時は終了日時よりも前に設定してください。".to_string(),
            Message::CityReadOnly(Operation::Create) => "市区町村を作成することはできません。".to_string(),
            Message::CityReadOnly(Operation::Update) => "市区町村を編集することはできません。".to_string(),
            Message::CityReadOnly(Operation::Delete) => "市区町村を削除することはできません。".to_string(),
        }
    }

    fn en(&self) -> String {
        match self {
            Message::NoData => "No data was provided.".to_string(),
            Message::Failed(Operation::Create) => "Failed to create the entry.".to_string(),
            Message::Failed(Operation::Update) => "Failed to update the entry.".to_string(),
            Message::Failed(Operation::Delete) => "Failed to delete the entry.".to_string(),
            Message::NotFound(content_type, id) => {
                let noun = match content_type {
                    ContentType::Article => "article",
                    ContentType::Community => "community",
                    ContentType::Opportunity => "opportunity",
                    ContentType::OpportunitySlot => "slot",
                    ContentType::Place => "place",
                    ContentType::City => "city",
                    ContentType::User => "user",
                };
                format!("No {} found: {}", noun, id)
            }
            Message::SlotRange => "The start time must be before the end time.".to_string(),
            Message::CityReadOnly(Operation::Create) => "Cities cannot be created.".to_string(),
            Message::CityReadOnly(Operation::Update) => "Cities cannot be edited.".to_string(),
            Message::CityReadOnly(Operation::Delete) => "Cities cannot be deleted.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_accept_language() {
        assert_eq!(Locale::from_accept_language("en-US,en;q=0.9,ja;q=0.8"), Some(Locale::En));
        assert_eq!(Locale::from_accept_language("fr-FR, ja-JP;q=0.5"), Some(Locale::Ja));
        assert_eq!(Locale::from_accept_language("de"), None);
        assert_eq!(Locale::from_accept_language(""), None);
    }

    #[test]
    fn renders_localized_messages() {
        let msg = Message::NotFound(ContentType::Opportunity, "opp-1".to_string());
        assert_eq!(msg.text(Locale::Ja), "該当する機会が見つかりませんでした: opp-1");
        assert_eq!(msg.text(Locale::En), "No opportunity found: opp-1");
        assert_eq!(Message::CityReadOnly(Operation::Delete).text(Locale::Ja), "市区町村を削除することはできません。");
    }
}
