use std::fmt::Display;
use std::str::FromStr;

use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::SqliteTypeInfo;
use sqlx::{Decode, Encode, Sqlite, Type};

/// Stores any value with a canonical text form (`Display` out, `FromStr`
/// back in) as a TEXT column. Used for ids, statuses and actions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DText<T>(pub T);

impl<T> DText<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for DText<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<'r, T> Decode<'r, Sqlite> for DText<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn decode(value: <Sqlite as sqlx::Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Sqlite>>::decode(value)?;
        Ok(Self(s.parse::<T>()?))
    }
}

impl<'q, T: Display> Encode<'q, Sqlite> for DText<T> {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <String as Encode<'q, Sqlite>>::encode(self.0.to_string(), buf)
    }
}

impl<T> Type<Sqlite> for DText<T> {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}
