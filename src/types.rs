/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Write operations the content handlers perform; selects the failure message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Content types served under `/content-manager`, addressed by CMS uid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Article,
    Community,
    Opportunity,
    OpportunitySlot,
    Place,
    City,
    User,
}

/// A relation the admin UI can open a picker for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationField {
    pub name: &'static str,
    pub target: ContentType,
    /// Table holding the link from source id to target key
    pub via_table: &'static str,
    /// Column of `via_table` holding the target key
    pub via_select: &'static str,
    /// Column of `via_table` holding the source id
    pub via_source: &'static str,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Article,
        ContentType::Community,
        ContentType::Opportunity,
        ContentType::OpportunitySlot,
        ContentType::Place,
        ContentType::City,
        ContentType::User,
    ];

    pub fn from_uid(uid: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.uid() == uid)
    }

    pub fn uid(&self) -> &'static str {
        match self {
            ContentType::Article => "api::article.article",
            ContentType::Community => "api::community.community",
            ContentType::Opportunity => "api::opportunity.opportunity",
            ContentType::OpportunitySlot => "api::opportunity-slot.opportunity-slot",
            ContentType::Place => "api::place.place",
            ContentType::City => "api::city.city",
            ContentType::User => "api::user.user",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ContentType::Article => "articles",
            ContentType::Community => "communities",
            ContentType::Opportunity => "opportunities",
            ContentType::OpportunitySlot => "opportunity_slots",
            ContentType::Place => "places",
            ContentType::City => "cities",
            ContentType::User => "users",
        }
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            ContentType::City => "code",
            _ => "id",
        }
    }

    /// Columns matched case-insensitively by the `_q` search term
    pub fn search_columns(&self) -> &'static [&'static str] {
        match self {
            ContentType::Article => &["title", "introduction", "body"],
            ContentType::Community => &["name", "point_name"],
            ContentType::Place => &["name", "address"],
            ContentType::User => &["name", "slug"],
            // State names are matched separately
            ContentType::City => &["name"],
            ContentType::Opportunity | ContentType::OpportunitySlot => &[],
        }
    }

    /// API field name → column, for `sort`
    pub fn sortable_fields(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ContentType::Article => &[
                ("id", "id"),
                ("title", "title"),
                ("category", "category"),
                ("publishStatus", "publish_status"),
                ("publishedAtOnDB", "published_at"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
            ContentType::Community => &[
                ("id", "id"),
                ("name", "name"),
                ("pointName", "point_name"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
            ContentType::Opportunity => &[
                ("id", "id"),
                ("title", "title"),
                ("category", "category"),
                ("requireApproval", "require_approval"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
            ContentType::OpportunitySlot => &[
                ("id", "id"),
                ("startsAt", "starts_at"),
                ("endsAt", "ends_at"),
                ("capacity", "capacity"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
            ContentType::Place => &[
                ("id", "id"),
                ("name", "name"),
                ("address", "address"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
            ContentType::City => &[("id", "code"), ("code", "code"), ("name", "name")],
            ContentType::User => &[
                ("id", "id"),
                ("name", "name"),
                ("slug", "slug"),
                ("createdAt", "created_at"),
                ("updatedAt", "updated_at"),
            ],
        }
    }

    /// Column and direction used when the request has no `sort`
    pub fn default_sort(&self) -> Option<&'static str> {
        match self {
            ContentType::City => None,
            _ => Some("created_at"),
        }
    }

    pub fn relation(&self, field: &str) -> Option<RelationField> {
        self.relations().iter().copied().find(|r| r.name == field)
    }

    pub fn relations(&self) -> &'static [RelationField] {
        match self {
            ContentType::Article => &[
                RelationField {
                    name: "community",
                    target: ContentType::Community,
                    via_table: "articles",
                    via_select: "community_id",
                    via_source: "id",
                },
                RelationField {
                    name: "authors",
                    target: ContentType::User,
                    via_table: "article_authors",
                    via_select: "user_id",
                    via_source: "article_id",
                },
                RelationField {
                    name: "relatedUsers",
                    target: ContentType::User,
                    via_table: "article_related_users",
                    via_select: "user_id",
                    via_source: "article_id",
                },
                RelationField {
                    name: "opportunities",
                    target: ContentType::Opportunity,
                    via_table: "article_opportunities",
                    via_select: "opportunity_id",
                    via_source: "article_id",
                },
            ],
            ContentType::Opportunity => &[
                RelationField {
                    name: "community",
                    target: ContentType::Community,
                    via_table: "opportunities",
                    via_select: "community_id",
                    via_source: "id",
                },
                RelationField {
                    name: "createdByOnDB",
                    target: ContentType::User,
                    via_table: "opportunities",
                    via_select: "created_by",
                    via_source: "id",
                },
                RelationField {
                    name: "place",
                    target: ContentType::Place,
                    via_table: "opportunities",
                    via_select: "place_id",
                    via_source: "id",
                },
            ],
            ContentType::OpportunitySlot => &[RelationField {
                name: "opportunity",
                target: ContentType::Opportunity,
                via_table: "opportunity_slots",
                via_select: "opportunity_id",
                via_source: "id",
            }],
            ContentType::Place => &[
                RelationField {
                    name: "community",
                    target: ContentType::Community,
                    via_table: "places",
                    via_select: "community_id",
                    via_source: "id",
                },
                RelationField {
                    name: "city",
                    target: ContentType::City,
                    via_table: "places",
                    via_select: "city_code",
                    via_source: "id",
                },
            ],
            ContentType::Community | ContentType::City | ContentType::User => &[],
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, ContentType::City)
    }
}
