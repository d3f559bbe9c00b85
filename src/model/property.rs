//! Normalized property names.
//!
//! A fixed, cross-tracker vocabulary for the kinds of data an adapter can
//! find in a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! properties {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Category of tracking data.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Property {
            $(
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl Property {
            pub const ALL: &'static [Property] = &[$(Property::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Property::$variant => $name,)*
                }
            }
        }
    };
}

properties! {
    AccelerometerX => "accelerometerX",
    AccelerometerY => "accelerometerY",
    AccelerometerZ => "accelerometerZ",
    AdvertisingId => "advertisingId",
    AppId => "appId",
    AppName => "appName",
    AppVersion => "appVersion",
    Architecture => "architecture",
    BatteryLevel => "batteryLevel",
    Carrier => "carrier",
    Country => "country",
    DeviceName => "deviceName",
    DiskFree => "diskFree",
    DiskTotal => "diskTotal",
    DiskUsed => "diskUsed",
    Idfv => "idfv",
    IsCharging => "isCharging",
    IsEmulator => "isEmulator",
    IsFirstLaunch => "isFirstLaunch",
    IsInBackground => "isInBackground",
    IsInDarkMode => "isInDarkMode",
    IsInForeground => "isInForeground",
    IsRoaming => "isRoaming",
    IsRooted => "isRooted",
    Language => "language",
    Latitude => "latitude",
    LocalIp => "localIp",
    Longitude => "longitude",
    MacAddress => "macAddress",
    Manufacturer => "manufacturer",
    Model => "model",
    NetworkConnectionType => "networkConnectionType",
    Orientation => "orientation",
    OsName => "osName",
    OsVersion => "osVersion",
    OtherIdentifiers => "otherIdentifiers",
    PublicIp => "publicIp",
    RamFree => "ramFree",
    RamTotal => "ramTotal",
    RamUsed => "ramUsed",
    Referer => "referer",
    Rotation => "rotation",
    ScreenHeight => "screenHeight",
    ScreenWidth => "screenWidth",
    SignalStrengthCellular => "signalStrengthCellular",
    SignalStrengthWifi => "signalStrengthWifi",
    StartTime => "startTime",
    Timezone => "timezone",
    TrackerSdkVersion => "trackerSdkVersion",
    Uptime => "uptime",
    UserAgent => "userAgent",
    UserId => "userId",
    ViewedPage => "viewedPage",
    Volume => "volume",
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown property `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_serde() {
        for property in Property::ALL {
            let json = serde_json::to_value(property).unwrap();
            assert_eq!(json, serde_json::Value::String(property.as_str().to_string()));
            assert_eq!(property.as_str().parse::<Property>(), Ok(*property));
        }
    }

    #[test]
    fn test_unknown_property() {
        assert!("deviceColour".parse::<Property>().is_err());
        assert!(serde_json::from_str::<Property>("\"deviceColour\"").is_err());
    }
}
