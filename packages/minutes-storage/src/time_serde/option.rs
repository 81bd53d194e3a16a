use serde::{Deserialize as _, Deserializer, Serializer};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => serializer.serialize_some(&Rfc3339Ref(value)),
		None => serializer.serialize_none(),
	}
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	Option::<Rfc3339Owned>::deserialize(deserializer).map(|value| value.map(|value| value.0))
}

struct Rfc3339Ref<'a>(&'a OffsetDateTime);
impl serde::Serialize for Rfc3339Ref<'_> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		crate::time_serde::serialize(self.0, serializer)
	}
}

struct Rfc3339Owned(OffsetDateTime);
impl<'de> serde::Deserialize<'de> for Rfc3339Owned {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		crate::time_serde::deserialize(deserializer).map(Self)
	}
}
