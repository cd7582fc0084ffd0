//! Column layout of the record sheets.
//!
//! Handlers address cells through these constants only; positions are 0-based
//! column indices (`A` = 0).

/// Column holding the record identifier in both layouts.
pub const IDENTIFIER: usize = 0;

/// Timestamp-keyed text rows.
pub mod generic {
    pub const ID: usize = 0;
    pub const TEXT: usize = 1;
    pub const WIDTH: usize = 2;
}

/// Product catalogue rows keyed by SKU.
pub mod product {
    pub const SKU: usize = 0;
    pub const SIZE: usize = 1;
    pub const CODE: usize = 2;
    pub const PRODUCT_NAME: usize = 3;
    pub const SMER: usize = 4;
    pub const SMER_UPDATED_PRICE: usize = 5;
    pub const KGA_PRICE: usize = 6;
    pub const SHOP_LINK: usize = 7;
    pub const LAZADA_LINK: usize = 8;
    pub const PICTURE_URL: usize = 9;
    pub const TIKTOK_LINK: usize = 10;
    pub const WIDTH: usize = 11;

    /// Header captions, in column order.
    pub const HEADERS: [&str; WIDTH] = [
        "SKU",
        "Size",
        "Code",
        "Product Name",
        "SMER",
        "SMER Updated Price",
        "KGA Price",
        "Shop Link",
        "Lazada Link",
        "Picture URL",
        "TikTok Link",
    ];
}
