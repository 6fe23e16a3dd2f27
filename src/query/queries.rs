/// Auction columns in `AuctionRow` order
macro_rules! auction_columns {
    () => {
        "id, product_name, description, starting_price, current_price, start_time, end_time, seller, highest_bidder, is_active, payment_status, images, created_at"
    };
}

/// Insert a new auction
pub const INSERT_AUCTION: &str = concat!(
    "INSERT INTO auctions (product_name, description, starting_price, current_price, start_time, end_time, seller, images, created_at)
     VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8)
     RETURNING ",
    auction_columns!()
);

/// Single auction
pub const GET_AUCTION: &str = concat!("SELECT ", auction_columns!(), " FROM auctions WHERE id = $1");

/// All auctions
pub const GET_ALL_AUCTIONS: &str = concat!(
    "SELECT ",
    auction_columns!(),
    " FROM auctions ORDER BY created_at DESC, id DESC"
);

/// Auctions of one seller
pub const GET_SELLER_AUCTIONS: &str = concat!(
    "SELECT ",
    auction_columns!(),
    " FROM auctions WHERE LOWER(seller) = LOWER($1) ORDER BY created_at DESC, id DESC"
);

/// Overwrite the editable fields, keeping current values for absent ones.
/// An end moved past the closing claim releases the claim.
pub const UPDATE_AUCTION: &str = concat!(
    "UPDATE auctions SET
        closing_claimed_at = CASE WHEN $2::timestamptz > closing_claimed_at THEN NULL ELSE closing_claimed_at END,
        end_time = COALESCE($2, end_time),
        is_active = COALESCE($3, is_active),
        payment_status = COALESCE($4, payment_status)
     WHERE id = $1
     RETURNING ",
    auction_columns!()
);

/// Delete one auction
pub const DELETE_AUCTION: &str = "DELETE FROM auctions WHERE id = $1";

/// Delete every auction of a seller
pub const DELETE_SELLER_AUCTIONS: &str =
    "DELETE FROM auctions WHERE LOWER(seller) = LOWER($1) RETURNING id";

/// Conditional bid write keyed on the price the bidder saw
pub const COMPARE_AND_SET_BID: &str = concat!(
    "UPDATE auctions SET current_price = $3, highest_bidder = $4
     WHERE id = $1 AND current_price = $2
     RETURNING ",
    auction_columns!()
);

/// Current price only
pub const GET_AUCTION_CURRENT_PRICE: &str = "SELECT current_price FROM auctions WHERE id = $1";

/// Claim ended auctions for the closing sweep
pub const CLAIM_ENDED_AUCTIONS: &str = concat!(
    "UPDATE auctions SET closing_claimed_at = $1
     WHERE closing_claimed_at IS NULL AND end_time <= $1
     RETURNING ",
    auction_columns!()
);

/// Record a payment
pub const INSERT_PAYMENT: &str = "INSERT INTO payments (auction_id, payer, amount, method, status, seller, paid_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7)
     RETURNING auction_id, payer, amount, method, status, seller, paid_at";

/// Mirror the payment outcome on the auction
pub const UPDATE_AUCTION_PAYMENT_STATUS: &str =
    "UPDATE auctions SET payment_status = $2 WHERE id = $1";

/// Payment of one auction
pub const GET_PAYMENT: &str = "SELECT auction_id, payer, amount, method, status, seller, paid_at FROM payments WHERE auction_id = $1";

/// All payments
pub const GET_ALL_PAYMENTS: &str = "SELECT auction_id, payer, amount, method, status, seller, paid_at FROM payments ORDER BY paid_at DESC";

/// Upsert a bidder profile
pub const PUT_USER: &str = "INSERT INTO users (uid, name, email, gender, city, role) VALUES ($1, $2, $3, $4, $5, $6)
     ON CONFLICT (uid) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, gender = EXCLUDED.gender, city = EXCLUDED.city, role = EXCLUDED.role";

pub const GET_USER: &str = "SELECT uid, name, email, gender, city, role FROM users WHERE uid = $1";

pub const GET_ALL_USERS: &str = "SELECT uid, name, email, gender, city, role FROM users ORDER BY email";

pub const DELETE_USER: &str =
    "DELETE FROM users WHERE uid = $1 RETURNING uid, name, email, gender, city, role";

/// Upsert a seller profile
pub const PUT_SELLER: &str = "INSERT INTO sellers (uid, business_name, seller_name, email, phone, address, city, role, approved, date_joined)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
     ON CONFLICT (uid) DO UPDATE SET business_name = EXCLUDED.business_name, seller_name = EXCLUDED.seller_name,
        email = EXCLUDED.email, phone = EXCLUDED.phone, address = EXCLUDED.address, city = EXCLUDED.city,
        role = EXCLUDED.role, approved = EXCLUDED.approved";

pub const GET_SELLER: &str = "SELECT uid, business_name, seller_name, email, phone, address, city, role, approved, date_joined FROM sellers WHERE uid = $1";

pub const GET_ALL_SELLERS: &str = "SELECT uid, business_name, seller_name, email, phone, address, city, role, approved, date_joined FROM sellers ORDER BY email";

pub const DELETE_SELLER: &str = "DELETE FROM sellers WHERE uid = $1
     RETURNING uid, business_name, seller_name, email, phone, address, city, role, approved, date_joined";

/// Record a notification
pub const INSERT_NOTIFICATION: &str = "INSERT INTO notifications (recipient, auction_id, kind, message, created_at)
     VALUES ($1, $2, $3, $4, $5)
     RETURNING id, recipient, auction_id, kind, message, created_at, read";

/// Notifications of one recipient
pub const GET_NOTIFICATIONS: &str = "SELECT id, recipient, auction_id, kind, message, created_at, read
     FROM notifications WHERE LOWER(recipient) = LOWER($1) ORDER BY created_at DESC, id DESC";

/// Register sign-in credentials
pub const INSERT_ACCOUNT: &str = "INSERT INTO accounts (uid, email, role, salt, password_hash) VALUES ($1, $2, $3, $4, $5)";

pub const GET_ACCOUNT_BY_EMAIL: &str =
    "SELECT uid, email, role, salt, password_hash FROM accounts WHERE LOWER(email) = LOWER($1)";

pub const GET_ACCOUNT_BY_UID: &str =
    "SELECT uid, email, role, salt, password_hash FROM accounts WHERE uid = $1";

pub const DELETE_ACCOUNT: &str =
    "DELETE FROM accounts WHERE uid = $1 RETURNING uid, email, role, salt, password_hash";
