use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::SqliteTypeInfo;
use sqlx::{Decode, Encode, Sqlite, Type};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// UTC timestamp stored as RFC 3339 text, nanosecond precision preserved
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DTime(pub OffsetDateTime);

impl From<OffsetDateTime> for DTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl From<DTime> for OffsetDateTime {
    fn from(value: DTime) -> Self {
        value.0
    }
}

impl<'r> Decode<'r, Sqlite> for DTime {
    fn decode(value: <Sqlite as sqlx::Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Sqlite>>::decode(value)?;
        Ok(Self(OffsetDateTime::parse(&s, &Rfc3339)?))
    }
}

impl<'q> Encode<'q, Sqlite> for DTime {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        let text = self.0.format(&Rfc3339)?;
        <String as Encode<'q, Sqlite>>::encode(text, buf)
    }
}

impl Type<Sqlite> for DTime {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}
