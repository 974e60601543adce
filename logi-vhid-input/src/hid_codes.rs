//! HID keyboard usage codes (usage page 0x07)

/// Named usage codes
pub mod keys {
    pub const A: u8 = 0x04;
    pub const Z: u8 = 0x1D;
    pub const N1: u8 = 0x1E;
    pub const N0: u8 = 0x27;
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2A;
    pub const TAB: u8 = 0x2B;
    pub const SPACE: u8 = 0x2C;
    pub const CAPS_LOCK: u8 = 0x39;
    pub const F1: u8 = 0x3A;
    pub const F12: u8 = 0x45;
    pub const PRINT_SCREEN: u8 = 0x46;
    pub const SCROLL_LOCK: u8 = 0x47;
    pub const PAUSE: u8 = 0x48;
    pub const INSERT: u8 = 0x49;
    pub const HOME: u8 = 0x4A;
    pub const PAGE_UP: u8 = 0x4B;
    pub const DELETE: u8 = 0x4C;
    pub const END: u8 = 0x4D;
    pub const PAGE_DOWN: u8 = 0x4E;
    pub const RIGHT: u8 = 0x4F;
    pub const LEFT: u8 = 0x50;
    pub const DOWN: u8 = 0x51;
    pub const UP: u8 = 0x52;
    pub const APPLICATION: u8 = 0x65;

    /// First and last modifier usages (LeftCtrl .. RightGui)
    pub const MODIFIER_FIRST: u8 = 0xE0;
    pub const MODIFIER_LAST: u8 = 0xE7;
}

/// True for the eight modifier usages
pub fn is_modifier_usage(code: u8) -> bool {
    (keys::MODIFIER_FIRST..=keys::MODIFIER_LAST).contains(&code)
}

/// Convert a character to HID keycode
/// Returns (keycode, needs_shift) or None if unsupported (US layout)
pub fn char_to_hid(ch: char) -> Option<(u8, bool)> {
    match ch {
        'a'..='z' => Some((keys::A + (ch as u8 - b'a'), false)),
        'A'..='Z' => Some((keys::A + (ch as u8 - b'A'), true)),
        '1'..='9' => Some((keys::N1 + (ch as u8 - b'1'), false)),
        '0' => Some((keys::N0, false)),
        ' ' => Some((keys::SPACE, false)),
        '\n' => Some((keys::ENTER, false)),
        '\t' => Some((keys::TAB, false)),
        '-' => Some((0x2D, false)),
        '=' => Some((0x2E, false)),
        '[' => Some((0x2F, false)),
        ']' => Some((0x30, false)),
        '\\' => Some((0x31, false)),
        ';' => Some((0x33, false)),
        '\'' => Some((0x34, false)),
        '`' => Some((0x35, false)),
        ',' => Some((0x36, false)),
        '.' => Some((0x37, false)),
        '/' => Some((0x38, false)),
        // Shifted digit row
        '!' => Some((0x1E, true)),
        '@' => Some((0x1F, true)),
        '#' => Some((0x20, true)),
        '$' => Some((0x21, true)),
        '%' => Some((0x22, true)),
        '^' => Some((0x23, true)),
        '&' => Some((0x24, true)),
        '*' => Some((0x25, true)),
        '(' => Some((0x26, true)),
        ')' => Some((0x27, true)),
        // Shifted punctuation
        '_' => Some((0x2D, true)),
        '+' => Some((0x2E, true)),
        '{' => Some((0x2F, true)),
        '}' => Some((0x30, true)),
        '|' => Some((0x31, true)),
        ':' => Some((0x33, true)),
        '"' => Some((0x34, true)),
        '~' => Some((0x35, true)),
        '<' => Some((0x36, true)),
        '>' => Some((0x37, true)),
        '?' => Some((0x38, true)),
        _ => None,
    }
}

/// Look up a key by name (`enter`, `f5`, `pgdn`, `a`, `0x2c`)
///
/// Single printable characters resolve through `char_to_hid` and ignore the
/// shift flag, so `A` and `a` are the same key.
pub fn key_from_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return u8::from_str_radix(hex, 16).ok().filter(|&c| c != 0);
    }
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return (1..=12).contains(&n).then(|| keys::F1 + n - 1);
    }
    let code = match lower.as_str() {
        "enter" | "return" => keys::ENTER,
        "esc" | "escape" => keys::ESCAPE,
        "backspace" | "bksp" => keys::BACKSPACE,
        "tab" => keys::TAB,
        "space" => keys::SPACE,
        "capslock" | "caps" => keys::CAPS_LOCK,
        "printscreen" | "prtsc" => keys::PRINT_SCREEN,
        "scrolllock" => keys::SCROLL_LOCK,
        "pause" => keys::PAUSE,
        "insert" | "ins" => keys::INSERT,
        "home" => keys::HOME,
        "pageup" | "pgup" => keys::PAGE_UP,
        "delete" | "del" => keys::DELETE,
        "end" => keys::END,
        "pagedown" | "pgdn" => keys::PAGE_DOWN,
        "right" => keys::RIGHT,
        "left" => keys::LEFT,
        "down" => keys::DOWN,
        "up" => keys::UP,
        "menu" | "app" => keys::APPLICATION,
        _ => {
            let mut chars = lower.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => char_to_hid(ch).map(|(code, _)| code),
                _ => None,
            };
        }
    };
    Some(code)
}
