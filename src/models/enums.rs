use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $s)]
                $variant
            ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Admin => "admin",
    Doctor => "doctor",
    Lab => "lab",
});

str_enum!(Urgency {
    Routine => "Routine",
    Urgent => "Urgent",
    Stat => "STAT",
});

str_enum!(RequestStatus {
    Pending => "Pending",
    SampleCollected => "Sample Collected",
    InProgress => "In Progress",
    Completed => "Completed",
    Cancelled => "Cancelled",
});

str_enum!(ItemStatus {
    Pending => "Pending",
    InProgress => "In Progress",
    Completed => "Completed",
});

str_enum!(ItemPriority {
    Normal => "Normal",
    High => "High",
    Critical => "Critical",
});

str_enum!(SampleStatus {
    Collected => "Collected",
    Received => "Received",
    Processing => "Processing",
    Tested => "Tested",
    Stored => "Stored",
    Discarded => "Discarded",
});

str_enum!(ResultStatus {
    Normal => "Normal",
    Abnormal => "Abnormal",
    Critical => "Critical",
});
