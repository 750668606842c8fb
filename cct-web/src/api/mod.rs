//! HTTP API handlers for cct-web

pub mod analysis;
pub mod buildinfo;
pub mod caucuses;
pub mod health;
pub mod images;
pub mod legislation;
pub mod members;
pub mod network;
pub mod summary;
pub mod ui;

pub use analysis::{
    cache_status, clear_cache, get_bipartisan_analysis, get_coalition_analysis, get_coalitions_analysis,
    get_complete_analysis, get_ideology_analysis, get_network_analysis, get_outliers_analysis, refresh_analysis,
};
pub use buildinfo::get_build_info;
pub use caucuses::{create_caucus_membership, end_caucus_membership, get_caucus, get_caucus_members, list_caucuses};
pub use health::health_routes;
pub use images::get_member_image;
pub use legislation::{get_cosponsors, get_votes, list_bills, list_rollcalls};
pub use members::{get_member, list_members};
pub use network::{caucus_network, cosponsorship_network, member_network, simplified_cosponsorship_network};
pub use summary::get_summary;
pub use ui::{serve_app_js, serve_index};
