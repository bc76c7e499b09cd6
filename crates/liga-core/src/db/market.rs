// Bid, offer and transfer rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LigaError, Result};
use crate::model::market::{
    Awaiting, Bid, BidStatus, Offer, OfferOrigin, OfferStatus, Transfer, TransferKind,
};
use crate::model::{from_epoch, to_epoch};

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

const BID_COLUMNS: &str = "id, player_id, team_id, amount, status, created_at";

fn bid_from_row(row: &Row<'_>) -> rusqlite::Result<Bid> {
    Ok(Bid {
        id: row.get(0)?,
        player_id: row.get(1)?,
        team_id: row.get(2)?,
        amount: row.get(3)?,
        status: row.get(4)?,
        created_at: from_epoch(row.get(5)?),
    })
}

fn query_bids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Bid>> {
    let mut stmt = conn.prepare(sql)?;
    let bids = stmt
        .query_map(params, bid_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(bids)
}

pub fn insert_bid(
    conn: &Connection,
    player_id: i64,
    team_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO bids (player_id, team_id, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![player_id, team_id, amount, BidStatus::Pending, to_epoch(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_bid(conn: &Connection, id: i64) -> Result<Bid> {
    conn.query_row(
        &format!("SELECT {BID_COLUMNS} FROM bids WHERE id = ?1"),
        params![id],
        bid_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("bid", id))
}

pub fn find_pending_bid(conn: &Connection, player_id: i64, team_id: i64) -> Result<Option<Bid>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {BID_COLUMNS} FROM bids
                 WHERE player_id = ?1 AND team_id = ?2 AND status = 'pending'"
            ),
            params![player_id, team_id],
            bid_from_row,
        )
        .optional()?)
}

/// Replace the amount of a pending bid. The bid keeps its original place in
/// the tie-break order.
/// Replace a bid's amount. The bid takes the place in the queue of a new
/// bid made at `now`.
pub fn replace_bid(conn: &Connection, id: i64, amount: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE bids SET amount = ?2, created_at = ?3 WHERE id = ?1",
        params![id, amount, to_epoch(now)],
    )?;
    Ok(())
}

pub fn set_bid_status(conn: &Connection, id: i64, status: BidStatus) -> Result<()> {
    conn.execute(
        "UPDATE bids SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    Ok(())
}

/// Pending bids on a player in settlement order: highest amount first,
/// earliest bid first among equal amounts.
pub fn pending_bids_for_player(conn: &Connection, player_id: i64) -> Result<Vec<Bid>> {
    query_bids(
        conn,
        &format!(
            "SELECT {BID_COLUMNS} FROM bids
             WHERE player_id = ?1 AND status = 'pending'
             ORDER BY amount DESC, created_at ASC, id ASC"
        ),
        params![player_id],
    )
}

pub fn pending_bids_for_team(conn: &Connection, team_id: i64) -> Result<Vec<Bid>> {
    query_bids(
        conn,
        &format!(
            "SELECT {BID_COLUMNS} FROM bids
             WHERE team_id = ?1 AND status = 'pending' ORDER BY created_at, id"
        ),
        params![team_id],
    )
}

pub fn count_pending_bids(conn: &Connection, player_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bids WHERE player_id = ?1 AND status = 'pending'",
        params![player_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// Fields of an offer about to be inserted.
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub player_id: i64,
    pub buyer_team_id: Option<i64>,
    pub seller_team_id: i64,
    pub amount: i64,
    pub origin: OfferOrigin,
    pub awaiting: Awaiting,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

const OFFER_COLUMNS: &str = "id, player_id, buyer_team_id, seller_team_id, amount, origin,
     awaiting, status, parent_id, created_at, expires_at";

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: row.get(0)?,
        player_id: row.get(1)?,
        buyer_team_id: row.get(2)?,
        seller_team_id: row.get(3)?,
        amount: row.get(4)?,
        origin: row.get(5)?,
        awaiting: row.get(6)?,
        status: row.get(7)?,
        parent_id: row.get(8)?,
        created_at: from_epoch(row.get(9)?),
        expires_at: from_epoch(row.get(10)?),
    })
}

fn query_offers<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Offer>> {
    let mut stmt = conn.prepare(sql)?;
    let offers = stmt
        .query_map(params, offer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(offers)
}

pub fn insert_offer(conn: &Connection, offer: &NewOffer) -> Result<Offer> {
    conn.execute(
        "INSERT INTO offers (player_id, buyer_team_id, seller_team_id, amount, origin, awaiting,
                             status, parent_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            offer.player_id,
            offer.buyer_team_id,
            offer.seller_team_id,
            offer.amount,
            offer.origin,
            offer.awaiting,
            OfferStatus::Pending,
            offer.parent_id,
            to_epoch(offer.created_at),
            to_epoch(offer.expires_at),
        ],
    )?;
    get_offer(conn, conn.last_insert_rowid())
}

pub fn get_offer(conn: &Connection, id: i64) -> Result<Offer> {
    conn.query_row(
        &format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1"),
        params![id],
        offer_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("offer", id))
}

pub fn set_offer_status(conn: &Connection, id: i64, status: OfferStatus) -> Result<()> {
    conn.execute(
        "UPDATE offers SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    Ok(())
}

pub fn pending_offers_for_player(conn: &Connection, player_id: i64) -> Result<Vec<Offer>> {
    query_offers(
        conn,
        &format!(
            "SELECT {OFFER_COLUMNS} FROM offers
             WHERE player_id = ?1 AND status = 'pending' ORDER BY created_at, id"
        ),
        params![player_id],
    )
}

/// Pending offers where the team is either buyer or seller.
pub fn pending_offers_for_team(conn: &Connection, team_id: i64) -> Result<Vec<Offer>> {
    query_offers(
        conn,
        &format!(
            "SELECT {OFFER_COLUMNS} FROM offers
             WHERE status = 'pending' AND (buyer_team_id = ?1 OR seller_team_id = ?1)
             ORDER BY created_at, id"
        ),
        params![team_id],
    )
}

/// Pending offers whose deadline passed at or before `now`.
pub fn expired_offers(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Offer>> {
    query_offers(
        conn,
        &format!(
            "SELECT {OFFER_COLUMNS} FROM offers
             WHERE status = 'pending' AND expires_at <= ?1 ORDER BY expires_at, id"
        ),
        params![to_epoch(now)],
    )
}

pub fn count_pending_offers(conn: &Connection, player_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM offers WHERE player_id = ?1 AND status = 'pending'",
        params![player_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

const TRANSFER_COLUMNS: &str = "id, player_id, from_team_id, to_team_id, amount, kind, at";

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<Transfer> {
    Ok(Transfer {
        id: row.get(0)?,
        player_id: row.get(1)?,
        from_team_id: row.get(2)?,
        to_team_id: row.get(3)?,
        amount: row.get(4)?,
        kind: row.get(5)?,
        at: from_epoch(row.get(6)?),
    })
}

pub fn insert_transfer(
    conn: &Connection,
    player_id: i64,
    from_team_id: Option<i64>,
    to_team_id: Option<i64>,
    amount: i64,
    kind: TransferKind,
    at: DateTime<Utc>,
) -> Result<Transfer> {
    conn.execute(
        "INSERT INTO transfers (player_id, from_team_id, to_team_id, amount, kind, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![player_id, from_team_id, to_team_id, amount, kind, to_epoch(at)],
    )?;
    Ok(Transfer {
        id: conn.last_insert_rowid(),
        player_id,
        from_team_id,
        to_team_id,
        amount,
        kind,
        at,
    })
}

/// Most recent transfers first.
pub fn recent_transfers(conn: &Connection, limit: usize) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers ORDER BY at DESC, id DESC LIMIT ?1"
    ))?;
    let transfers = stmt
        .query_map(params![limit as i64], transfer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(transfers)
}

pub fn transfers_for_player(conn: &Connection, player_id: i64) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE player_id = ?1 ORDER BY at, id"
    ))?;
    let transfers = stmt
        .query_map(params![player_id], transfer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(transfers)
}
