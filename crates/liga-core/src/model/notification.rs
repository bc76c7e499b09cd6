use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

text_enum! {
    pub enum NotificationKind {
        BidWon => "bid_won",
        BidLost => "bid_lost",
        BidEscalated => "bid_escalated",
        OfferReceived => "offer_received",
        OfferAccepted => "offer_accepted",
        OfferRejected => "offer_rejected",
        OfferCountered => "offer_countered",
        OfferWithdrawn => "offer_withdrawn",
        OfferExpired => "offer_expired",
        OfferCancelled => "offer_cancelled",
        PlayerSold => "player_sold",
        PlayerBought => "player_bought",
        SystemOffer => "system_offer",
        ListingExpired => "listing_expired",
        LineupIncomplete => "lineup_incomplete",
        Payout => "payout",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub team_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}
