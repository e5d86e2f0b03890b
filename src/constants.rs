/// Portal paths, form fields and markup identifiers.
/// The portal spells some ids inconsistently; those are copied as-is.

pub const DEFAULT_BASE_URL: &str = "https://www.golfbox.no";
pub const DEFAULT_TIMEZONE: &str = "Europe/Oslo";

pub const LOGIN_PATH: &str = "/login.asp";
pub const CLUB_CHOOSER_PATH: &str = "/site/ressources/booking/chooseclub.asp";
pub const GRID_PATH: &str = "/site/my_golfbox/ressources/booking/grid.asp";

/// Fixed `selected` GUID the club chooser expects when posting `getClub`.
pub const CLUB_CHOOSER_SELECTED: &str = "3C37481D-8C34-4E3F-BCF5-BE2693C983D8";

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

// Login form
pub const LOGIN_COMMAND: &str = "login";
pub const LOGIN_FIELD_SUBMITTED: &str = "loginform.submitted";
pub const LOGIN_FIELD_USERNAME: &str = "loginform.username";
pub const LOGIN_FIELD_PASSWORD: &str = "loginform.password";
pub const LOGIN_FIELD_SUBMIT: &str = "loginform.submit";

// Catalog selection controls
pub const CLUB_SELECT_ID: &str = "ddlClub";
pub const COURSE_SELECT_IDS: [&str; 2] = ["ddlRessoruce", "ddlRessource_GUID"];
pub const COURSE_PLACEHOLDER_VALUE: &str = "x";
pub const GET_CLUB_COMMAND: &str = "getClub";

/// Grid page date token, e.g. `20250601T000000`.
pub const DATE_TOKEN_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Seats per tee time.
pub const MAX_PLAYERS: u8 = 4;

// Environment variables holding portal credentials
pub const ENV_USERNAME: &str = "GOLFBOX_USERNAME";
pub const ENV_PASSWORD: &str = "GOLFBOX_PASSWORD";
