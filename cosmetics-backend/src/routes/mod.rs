mod cosmetics;
mod entries;
mod players;

pub(crate) use cosmetics::{
    create_cosmetic, create_cosmetic_from_body, delete_cosmetic, delete_cosmetic_from_body,
    get_cosmetic, list_cosmetic_ids, update_cosmetic, update_cosmetic_from_body, upsert_cosmetic,
    upsert_cosmetic_from_body,
};
pub(crate) use entries::get_entries;
pub(crate) use players::{
    add_player_cosmetic, delete_player, get_player, get_player_data, list_player_ids,
    remove_player_cosmetic, set_player_data,
};
