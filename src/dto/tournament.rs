use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Tournament label sent with every operations-hub notification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct TournamentLabelBody {
    /// Display label, for example `Beach Open 2025`.
    #[validate(length(min = 1, max = 120))]
    pub label: String,
}
