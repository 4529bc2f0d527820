use uuid::Uuid;

/// A stored cosmetic definition.
#[derive(Debug, Clone)]
pub struct Cosmetic {
  /// Namespace-style identifier (e.g., "torch", "hats.top_hat")
  pub id: String,
  /// Positive revision number
  pub version: i64,
  /// The full JSON document, including `id` and `version`
  pub data: String,
}

/// A player together with the ids of every cosmetic they own.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerWithCosmetics {
  pub id: Uuid,
  /// Opaque custom data, always a JSON object
  pub data: String,
  /// Owned cosmetic ids in ascending order
  pub cosmetics: Vec<String>,
}
