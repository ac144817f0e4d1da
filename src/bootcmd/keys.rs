//! X11 keysym mapping for boot command keys.

/// Keysym sent around shifted characters.
pub const KEY_LEFT_SHIFT: u32 = 0xFFE1;

/// Characters that require a shift modifier on a US keyboard layout.
const SHIFTED_CHARS: &str = "~!@#$%^&*()_+{}|:\"<>?";

/// Named special keys accepted in boot command scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Spacebar,
    Up,
    Down,
    Left,
    Right,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Menu,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    LeftAlt,
    LeftCtrl,
    LeftShift,
    RightAlt,
    RightCtrl,
    RightShift,
    LeftSuper,
    RightSuper,
}

impl SpecialKey {
    /// Look up a key by its lowercased script tag, e.g. `enter` or `leftshift`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        use SpecialKey::*;
        let key = match tag {
            "enter" | "return" => Enter,
            "esc" => Esc,
            "bs" => Backspace,
            "del" => Delete,
            "tab" => Tab,
            "spacebar" => Spacebar,
            "up" => Up,
            "down" => Down,
            "left" => Left,
            "right" => Right,
            "insert" => Insert,
            "home" => Home,
            "end" => End,
            "pageup" => PageUp,
            "pagedown" => PageDown,
            "menu" => Menu,
            "f1" => F1,
            "f2" => F2,
            "f3" => F3,
            "f4" => F4,
            "f5" => F5,
            "f6" => F6,
            "f7" => F7,
            "f8" => F8,
            "f9" => F9,
            "f10" => F10,
            "f11" => F11,
            "f12" => F12,
            "leftalt" => LeftAlt,
            "leftctrl" => LeftCtrl,
            "leftshift" => LeftShift,
            "rightalt" => RightAlt,
            "rightctrl" => RightCtrl,
            "rightshift" => RightShift,
            "leftsuper" => LeftSuper,
            "rightsuper" => RightSuper,
            _ => return None,
        };
        Some(key)
    }

    pub fn keysym(self) -> u32 {
        use SpecialKey::*;
        match self {
            Enter => 0xFF0D,
            Esc => 0xFF1B,
            Backspace => 0xFF08,
            Delete => 0xFFFF,
            Tab => 0xFF09,
            Spacebar => 0x0020,
            Up => 0xFF52,
            Down => 0xFF54,
            Left => 0xFF51,
            Right => 0xFF53,
            Insert => 0xFF63,
            Home => 0xFF50,
            End => 0xFF57,
            PageUp => 0xFF55,
            PageDown => 0xFF56,
            Menu => 0xFF67,
            F1 => 0xFFBE,
            F2 => 0xFFBF,
            F3 => 0xFFC0,
            F4 => 0xFFC1,
            F5 => 0xFFC2,
            F6 => 0xFFC3,
            F7 => 0xFFC4,
            F8 => 0xFFC5,
            F9 => 0xFFC6,
            F10 => 0xFFC7,
            F11 => 0xFFC8,
            F12 => 0xFFC9,
            LeftAlt => 0xFFE9,
            LeftCtrl => 0xFFE3,
            LeftShift => 0xFFE1,
            RightAlt => 0xFFEA,
            RightCtrl => 0xFFE4,
            RightShift => 0xFFE2,
            LeftSuper => 0xFFEB,
            RightSuper => 0xFFEC,
        }
    }
}

/// Keysym for a literal character, plus whether it needs a shift modifier.
///
/// Latin-1 characters map directly to their code point; anything beyond is
/// encoded with the X11 unicode keysym offset.
pub fn keysym_for_char(c: char) -> (u32, bool) {
    let shifted = c.is_ascii_uppercase() || SHIFTED_CHARS.contains(c);
    let cp = c as u32;
    let keysym = if cp < 0x100 { cp } else { 0x0100_0000 + cp };
    (keysym, shifted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_resolve_to_expected_keysyms() {
        assert_eq!(SpecialKey::from_tag("enter").unwrap().keysym(), 0xFF0D);
        assert_eq!(SpecialKey::from_tag("return").unwrap().keysym(), 0xFF0D);
        assert_eq!(SpecialKey::from_tag("f12").unwrap().keysym(), 0xFFC9);
        assert_eq!(SpecialKey::from_tag("leftshift").unwrap().keysym(), 0xFFE1);
        assert!(SpecialKey::from_tag("bogus").is_none());
    }

    #[test]
    fn ascii_literals_map_to_their_code_points() {
        assert_eq!(keysym_for_char('a'), (0x61, false));
        assert_eq!(keysym_for_char('A'), (0x41, true));
        assert_eq!(keysym_for_char('?'), (0x3F, true));
        assert_eq!(keysym_for_char('/'), (0x2F, false));
    }

    #[test]
    fn non_latin1_literals_use_unicode_offset() {
        assert_eq!(keysym_for_char('€'), (0x0100_0000 + 0x20AC, false));
    }
}
