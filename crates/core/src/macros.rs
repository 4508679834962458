/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored as text.
///
/// `|value| <expr>` builds the parse error from the rejected input (an owned `String`).
macro_rules! string_enum {
    (
        $name:ident, $err_ty:ty, |$value:ident| $err:expr;
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        impl $name {
            /// Returns the database representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $err_ty;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => {
                        let $value = other.to_string();
                        Err($err)
                    }
                }
            }
        }
    };
}
