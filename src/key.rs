//! Registry key types and key normalization.
//!
//! Callers identify resources with a [`Key`]. Every key is reduced to a
//! [`NormalizedKey`] before it touches the lock table, the in-flight table or
//! the instance store, so that equal identities share a slot no matter how the
//! caller spelled them.

use std::fmt;
use std::sync::Arc;

use crate::factory::{Built, Constructor};
use crate::traits::Teardown;

/// Caller-supplied identity of a registry slot.
///
/// Keys come in a closed set of shapes. The normalizer maps each of them onto
/// a [`NormalizedKey`]:
///
/// - **Name**: a case-insensitive string (`"Embedder"` and `"embedder"` match)
/// - **Type**: a Rust type, optionally carrying a constructor
/// - **Instance**: the type of a value the caller already holds
/// - **Generic**: an origin key plus ordered type arguments
/// - **Opaque**: anything else, identified by its `Debug` output
///
/// # Examples
///
/// ```rust
/// use ferrous_registry::Key;
///
/// struct TextSplitter;
///
/// assert_eq!(Key::from("OIDC").normalize(), Key::from("oidc").normalize());
/// assert_eq!(
///     Key::of::<TextSplitter>().normalize(),
///     Key::instance_of(&TextSplitter).normalize(),
/// );
/// assert_ne!(
///     Key::of::<Vec<i32>>().normalize(),
///     Key::of::<Vec<String>>().normalize(),
/// );
/// ```
#[derive(Clone)]
pub enum Key {
    /// Case-insensitive string key
    Name(String),
    /// Type descriptor, constructible when it carries a constructor
    Type(TypeKey),
    /// Type of an existing value
    Instance(&'static str),
    /// Parameterized generic: origin plus ordered arguments
    Generic(Box<Key>, Vec<Key>),
    /// Fallback identity taken from a `Debug` representation
    Opaque(String),
}

/// Type descriptor used by [`Key::Type`].
#[derive(Clone)]
pub struct TypeKey {
    type_name: &'static str,
    constructor: Option<Constructor>,
}

impl TypeKey {
    /// The `std::any::type_name` of the described type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns true when the key can build its own instance.
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }
}

impl Key {
    /// String key, compared case-insensitively.
    pub fn name(name: impl Into<String>) -> Self {
        Key::Name(name.into())
    }

    /// Type key for `T`. Not constructible: `create` needs an explicit factory.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeKey {
            type_name: std::any::type_name::<T>(),
            constructor: None,
        })
    }

    /// Type key for `T` that constructs `T::default()` when no factory is given.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_registry::{Key, Registry};
    ///
    /// #[derive(Default)]
    /// struct Settings { chunk_size: usize }
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let registry = Registry::new();
    /// let settings = registry
    ///     .create::<Settings>(Key::constructible::<Settings>(), None)
    ///     .await
    ///     .unwrap();
    /// assert_eq!(settings.chunk_size, 0);
    /// # }
    /// ```
    pub fn constructible<T: Default + Send + Sync + 'static>() -> Self {
        let constructor: Constructor = Arc::new(|| Ok(Built::new(T::default())));
        Key::Type(TypeKey {
            type_name: std::any::type_name::<T>(),
            constructor: Some(constructor),
        })
    }

    /// Like [`Key::constructible`], and the built instance is torn down through
    /// its [`Teardown`] implementation by `close_all`.
    pub fn closeable<T: Default + Teardown>() -> Self {
        let constructor: Constructor = Arc::new(|| Ok(Built::closeable(T::default())));
        Key::Type(TypeKey {
            type_name: std::any::type_name::<T>(),
            constructor: Some(constructor),
        })
    }

    /// Key naming the type of `value`. Normalizes equal to `Key::of::<T>()`.
    pub fn instance_of<T: ?Sized + 'static>(_value: &T) -> Self {
        Key::Instance(std::any::type_name::<T>())
    }

    /// Parameterized generic key.
    pub fn generic(origin: impl Into<Key>, args: impl IntoIterator<Item = Key>) -> Self {
        Key::Generic(Box::new(origin.into()), args.into_iter().collect())
    }

    /// Opaque key identified by the `Debug` representation of `value`.
    pub fn opaque<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Key::Opaque(format!("{:?}", value))
    }

    /// Maps the key onto its canonical identity.
    pub fn normalize(&self) -> NormalizedKey {
        match self {
            Key::Name(name) => NormalizedKey::String(name.to_lowercase()),
            Key::Generic(origin, args) => NormalizedKey::Generic(
                Box::new(origin.normalize()),
                args.iter().map(Key::normalize).collect(),
            ),
            Key::Type(ty) => NormalizedKey::from_type_name(ty.type_name),
            Key::Instance(type_name) => NormalizedKey::from_type_name(type_name),
            Key::Opaque(repr) => NormalizedKey::Opaque(repr.clone()),
        }
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        match self {
            Key::Type(ty) => ty.constructor.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Key::Type(ty) => f
                .debug_struct("Type")
                .field("type_name", &ty.type_name)
                .field("constructible", &ty.is_constructible())
                .finish(),
            Key::Instance(type_name) => f.debug_tuple("Instance").field(type_name).finish(),
            Key::Generic(origin, args) => {
                f.debug_tuple("Generic").field(origin).field(args).finish()
            }
            Key::Opaque(repr) => f.debug_tuple("Opaque").field(repr).finish(),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// Canonical, hashable identity of a registry slot.
///
/// Two keys denote the same resource exactly when their normalized forms are
/// equal. Variants never compare equal to each other, so an opaque key can not
/// collide with a name or a type that happens to print the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizedKey {
    /// Lowercased string
    String(String),
    /// Module path and type name
    Type(String, String),
    /// Normalized origin and ordered normalized arguments
    Generic(Box<NormalizedKey>, Vec<NormalizedKey>),
    /// Debug representation of an otherwise unidentifiable key
    Opaque(String),
}

impl NormalizedKey {
    /// Parses a `std::any::type_name` string.
    ///
    /// Plain paths split into module and name; generic paths become
    /// [`NormalizedKey::Generic`] with each argument parsed recursively. Names
    /// that are not paths (references, tuples, slices, trait objects, function
    /// pointers) are kept whole with an empty module.
    ///
    /// ```rust
    /// use ferrous_registry::NormalizedKey;
    ///
    /// assert_eq!(
    ///     NormalizedKey::from_type_name("alloc::string::String"),
    ///     NormalizedKey::Type("alloc::string".into(), "String".into()),
    /// );
    /// assert_eq!(
    ///     NormalizedKey::from_type_name("alloc::vec::Vec<u8>"),
    ///     NormalizedKey::Generic(
    ///         Box::new(NormalizedKey::Type("alloc::vec".into(), "Vec".into())),
    ///         vec![NormalizedKey::Type(String::new(), "u8".into())],
    ///     ),
    /// );
    /// ```
    pub fn from_type_name(type_name: &str) -> Self {
        let type_name = type_name.trim();
        match split_generic(type_name) {
            Some((origin, args)) => NormalizedKey::Generic(
                Box::new(split_path(origin)),
                split_args(args)
                    .into_iter()
                    .map(NormalizedKey::from_type_name)
                    .collect(),
            ),
            None => split_path(type_name),
        }
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedKey::String(s) => f.write_str(s),
            NormalizedKey::Type(module, name) if module.is_empty() => f.write_str(name),
            NormalizedKey::Type(module, name) => write!(f, "{}::{}", module, name),
            NormalizedKey::Generic(origin, args) => {
                write!(f, "{}<", origin)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            NormalizedKey::Opaque(repr) => write!(f, "opaque({})", repr),
        }
    }
}

fn is_path(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':')
}

fn split_path(s: &str) -> NormalizedKey {
    if is_path(s) {
        if let Some((module, name)) = s.rsplit_once("::") {
            return NormalizedKey::Type(module.to_string(), name.to_string());
        }
    }
    NormalizedKey::Type(String::new(), s.to_string())
}

/// Splits `path<args>` into the path and the raw argument list, provided the
/// first `<` is closed by the final `>`.
fn split_generic(s: &str) -> Option<(&str, &str)> {
    let open = s.find('<')?;
    let origin = &s[..open];
    if !is_path(origin) || !s.ends_with('>') {
        return None;
    }
    let inner = &s[open + 1..s.len() - 1];
    let mut depth = 0i32;
    let mut prev = ' ';
    for c in inner.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            // `->` in fn pointer types is not a closing bracket
            '>' if prev == '-' => {}
            '>' | ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
        prev = c;
    }
    (depth == 0).then_some((origin, inner))
}

fn split_args(s: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' if prev == '-' => {}
            '>' | ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                args.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        prev = c;
    }
    args.push(s[start..].trim());
    args.retain(|a| !a.is_empty());
    args
}
