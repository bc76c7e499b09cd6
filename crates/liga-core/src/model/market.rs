// Bids, offers and transfer history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

text_enum! {
    pub enum BidStatus {
        Pending => "pending",
        Won => "won",
        Lost => "lost",
        Cancelled => "cancelled",
        /// Below the asking price at expiry; turned into an offer to the seller.
        Escalated => "escalated",
    }
}

text_enum! {
    /// How an offer came to exist.
    pub enum OfferOrigin {
        Direct => "direct",
        Counter => "counter",
        FromBid => "from_bid",
        System => "system",
    }
}

text_enum! {
    /// The side that has to answer a pending offer.
    pub enum Awaiting {
        Buyer => "buyer",
        Seller => "seller",
    }
}

impl Awaiting {
    pub fn flipped(self) -> Self {
        match self {
            Awaiting::Buyer => Awaiting::Seller,
            Awaiting::Seller => Awaiting::Buyer,
        }
    }
}

text_enum! {
    pub enum OfferStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Countered => "countered",
        Expired => "expired",
        Withdrawn => "withdrawn",
        /// The player moved through another deal first.
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum TransferKind {
        MarketPurchase => "market_purchase",
        AuctionWin => "auction_win",
        OfferAccepted => "offer_accepted",
        SaleToBank => "sale_to_bank",
        SystemBuyout => "system_buyout",
    }
}

/// A sealed bid on a listed player. Resolved when the listing expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub player_id: i64,
    pub team_id: i64,
    pub amount: i64,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

/// A negotiated sale of an owned player.
///
/// `buyer_team_id == None` means the bank is buying (system offers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    pub player_id: i64,
    pub buyer_team_id: Option<i64>,
    pub seller_team_id: i64,
    pub amount: i64,
    pub origin: OfferOrigin,
    pub awaiting: Awaiting,
    pub status: OfferStatus,
    /// The offer this one counters, if any.
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Offer {
    /// Team that must answer, `None` when the bank is the awaited party.
    pub fn awaiting_team(&self) -> Option<i64> {
        match self.awaiting {
            Awaiting::Seller => Some(self.seller_team_id),
            Awaiting::Buyer => self.buyer_team_id,
        }
    }

    /// Team on the other side of the awaiting party.
    pub fn proposing_team(&self) -> Option<i64> {
        match self.awaiting {
            Awaiting::Seller => self.buyer_team_id,
            Awaiting::Buyer => Some(self.seller_team_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub player_id: i64,
    /// `None` when the player came from the free-agent pool.
    pub from_team_id: Option<i64>,
    /// `None` when the player went back to the free-agent pool.
    pub to_team_id: Option<i64>,
    pub amount: i64,
    pub kind: TransferKind,
    pub at: DateTime<Utc>,
}
