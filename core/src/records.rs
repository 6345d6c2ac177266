//! Entity records for the logbook tables.
//!
//! Each record is a plain read-only snapshot of one row. Reference columns
//! are kept as raw ids (`Option<i64>` when the reference is optional) so the
//! integrity verifier can report exactly which id failed to resolve.
//!
//! Master data: [`VehicleMake`], [`Vehicle`], [`Person`], [`GeoArea`],
//! [`Location`], [`ViaRoute`], [`GasBrandGrade`], [`FreqTrip`],
//! [`FreqTripStop`]. Transactional data: [`Trip`], [`TripStop`],
//! [`TripStopGas`].

use std::fmt;

use serde::Serialize;

use crate::error::RecordError;
use crate::value::{ID_FIELD, Row};

/// Identifies which table a record or failing id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    VehicleMake,
    Vehicle,
    Person,
    GeoArea,
    Location,
    ViaRoute,
    GasBrandGrade,
    FreqTrip,
    FreqTripStop,
    Trip,
    TripStop,
    TripStopGas,
}

impl RecordKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::VehicleMake => VehicleMake::TABLE,
            RecordKind::Vehicle => Vehicle::TABLE,
            RecordKind::Person => Person::TABLE,
            RecordKind::GeoArea => GeoArea::TABLE,
            RecordKind::Location => Location::TABLE,
            RecordKind::ViaRoute => ViaRoute::TABLE,
            RecordKind::GasBrandGrade => GasBrandGrade::TABLE,
            RecordKind::FreqTrip => FreqTrip::TABLE,
            RecordKind::FreqTripStop => FreqTripStop::TABLE,
            RecordKind::Trip => Trip::TABLE,
            RecordKind::TripStop => TripStop::TABLE,
            RecordKind::TripStopGas => TripStopGas::TABLE,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::VehicleMake => "VehicleMake",
            RecordKind::Vehicle => "Vehicle",
            RecordKind::Person => "Person",
            RecordKind::GeoArea => "GeoArea",
            RecordKind::Location => "Location",
            RecordKind::ViaRoute => "ViaRoute",
            RecordKind::GasBrandGrade => "GasBrandGrade",
            RecordKind::FreqTrip => "FreqTrip",
            RecordKind::FreqTripStop => "FreqTripStop",
            RecordKind::Trip => "Trip",
            RecordKind::TripStop => "TStop",
            RecordKind::TripStopGas => "TStopGas",
        };
        f.write_str(name)
    }
}

/// A record type backed by one table.
pub trait Entity: Sized + Clone {
    /// Table holding rows of this type.
    const TABLE: &'static str;
    /// Columns to request when loading; always starts with `_id`.
    const FIELDS: &'static [&'static str];
    /// Kind tag used in failure reports.
    const KIND: RecordKind;

    /// Reads a record from a row containing at least [`Self::FIELDS`].
    fn from_row(row: &Row) -> Result<Self, RecordError>;

    /// Primary key.
    fn id(&self) -> i64;

    /// Wraps the record into the type-erased [`Record`].
    fn into_record(self) -> Record;
}

macro_rules! entity_impl {
    ($ty:ident, $table:literal, $kind:ident, [$($field:literal),* $(,)?]) => {
        impl Entity for $ty {
            const TABLE: &'static str = $table;
            const FIELDS: &'static [&'static str] = &[ID_FIELD, $($field),*];
            const KIND: RecordKind = RecordKind::$kind;

            fn from_row(row: &Row) -> Result<Self, RecordError> {
                $ty::read(row)
            }

            fn id(&self) -> i64 {
                self.id
            }

            fn into_record(self) -> Record {
                Record::$kind(self)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleMake {
    pub id: i64,
    pub name: String,
}

impl VehicleMake {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            name: row.text("mname")?,
        })
    }
}

entity_impl!(VehicleMake, "vehiclemake", VehicleMake, ["mname"]);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: i64,
    pub nickname: Option<String>,
    pub vin: Option<String>,
    /// Required reference to [`VehicleMake`].
    pub make_id: i64,
    pub model: Option<String>,
    pub model_year: Option<i64>,
    pub odo_orig: i64,
    pub comment: Option<String>,
    /// Usual driver ([`Person`]), if any.
    pub driver_id: Option<i64>,
    /// Most recent [`Trip`] taken in this vehicle, if any.
    pub last_trip_id: Option<i64>,
    pub is_disabled: bool,
}

impl Vehicle {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            nickname: row.opt_text("nickname")?,
            vin: row.opt_text("vin")?,
            make_id: row.i64("makeid")?,
            model: row.opt_text("model")?,
            model_year: row.opt_i64("modelyear")?,
            odo_orig: row.opt_i64("odo_orig")?.unwrap_or(0),
            comment: row.opt_text("comment")?,
            driver_id: row.opt_id("driverid")?,
            last_trip_id: row.opt_id("last_tripid")?,
            is_disabled: row.flag("is_disabled")?,
        })
    }
}

entity_impl!(
    Vehicle,
    "vehicle",
    Vehicle,
    [
        "nickname",
        "vin",
        "makeid",
        "model",
        "modelyear",
        "odo_orig",
        "comment",
        "driverid",
        "last_tripid",
        "is_disabled",
    ]
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub is_driver: bool,
    pub comment: Option<String>,
    pub is_disabled: bool,
}

impl Person {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            name: row.text("name")?,
            is_driver: row.flag("is_driver")?,
            comment: row.opt_text("comment")?,
            is_disabled: row.flag("is_disabled")?,
        })
    }
}

entity_impl!(
    Person,
    "person",
    Person,
    ["name", "is_driver", "comment", "is_disabled"]
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoArea {
    pub id: i64,
    pub name: String,
}

impl GeoArea {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            name: row.text("aname")?,
        })
    }
}

entity_impl!(GeoArea, "geoarea", GeoArea, ["aname"]);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: i64,
    /// Area the location lies in; `None` for roadtrip-only locations.
    pub area_id: Option<i64>,
    pub description: String,
    pub latest_brand_grade_id: Option<i64>,
}

impl Location {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            area_id: row.opt_id("a_id")?,
            description: row.text("loc_descr")?,
            latest_brand_grade_id: row.opt_id("latest_gas_brandgrade_id")?,
        })
    }
}

entity_impl!(
    Location,
    "location",
    Location,
    ["a_id", "loc_descr", "latest_gas_brandgrade_id"]
);

/// A named route between two locations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViaRoute {
    pub id: i64,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub description: String,
    pub odo_dist: Option<i64>,
}

impl ViaRoute {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            from_location_id: row.i64("locid_from")?,
            to_location_id: row.i64("locid_to")?,
            description: row.text("via_descr")?,
            odo_dist: row.opt_i64("odo_dist")?,
        })
    }
}

entity_impl!(
    ViaRoute,
    "via_route",
    ViaRoute,
    ["locid_from", "locid_to", "via_descr", "odo_dist"]
);

/// Fuel brand and grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasBrandGrade {
    pub id: i64,
    pub name: String,
}

impl GasBrandGrade {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            name: row.text("name")?,
        })
    }
}

entity_impl!(GasBrandGrade, "gas_brandgrade", GasBrandGrade, ["name"]);

/// A frequently taken trip, used as a template for new trips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreqTrip {
    pub id: i64,
    pub area_id: i64,
    pub start_location_id: Option<i64>,
    pub end_location_id: i64,
    pub end_via_id: Option<i64>,
    pub description: Option<String>,
    pub roadtrip_end_area_id: Option<i64>,
    pub is_roundtrip: bool,
}

impl FreqTrip {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            area_id: row.i64("a_id")?,
            start_location_id: row.opt_id("start_locid")?,
            end_location_id: row.i64("end_locid")?,
            end_via_id: row.opt_id("end_via_id")?,
            description: row.opt_text("descr")?,
            roadtrip_end_area_id: row.opt_id("roadtrip_end_aid")?,
            is_roundtrip: row.flag("is_roundtrip")?,
        })
    }
}

entity_impl!(
    FreqTrip,
    "freqtrip",
    FreqTrip,
    [
        "a_id",
        "start_locid",
        "end_locid",
        "end_via_id",
        "descr",
        "roadtrip_end_aid",
        "is_roundtrip",
    ]
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreqTripStop {
    pub id: i64,
    pub freq_trip_id: i64,
    pub location_id: i64,
    pub via_id: Option<i64>,
    pub odo_trip: Option<i64>,
}

impl FreqTripStop {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            freq_trip_id: row.i64("freqtripid")?,
            location_id: row.i64("locid")?,
            via_id: row.opt_id("via_id")?,
            odo_trip: row.opt_i64("odo_trip")?,
        })
    }
}

entity_impl!(
    FreqTripStop,
    "freqtrip_tstop",
    FreqTripStop,
    ["freqtripid", "locid", "via_id", "odo_trip"]
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub id: i64,
    pub vehicle_id: i64,
    pub driver_id: i64,
    pub odo_start: i64,
    pub odo_end: Option<i64>,
    pub area_id: i64,
    pub time_start: i64,
    pub time_end: Option<i64>,
    pub comment: Option<String>,
    pub freq_trip_id: Option<i64>,
    /// Destination area of a roadtrip; `None` for local trips.
    pub roadtrip_end_area_id: Option<i64>,
    /// Stop of an earlier trip where this trip started, if recorded.
    pub start_stop_id: Option<i64>,
}

impl Trip {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            vehicle_id: row.i64("vid")?,
            driver_id: row.i64("did")?,
            odo_start: row.i64("odo_start")?,
            odo_end: row.opt_i64("odo_end")?,
            area_id: row.i64("aid")?,
            time_start: row.i64("time_start")?,
            time_end: row.opt_i64("time_end")?,
            comment: row.opt_text("comment")?,
            freq_trip_id: row.opt_id("freqtripid")?,
            roadtrip_end_area_id: row.opt_id("roadtrip_end_aid")?,
            start_stop_id: row.opt_id("tstopid_start")?,
        })
    }
}

entity_impl!(
    Trip,
    "trip",
    Trip,
    [
        "vid",
        "did",
        "odo_start",
        "odo_end",
        "aid",
        "time_start",
        "time_end",
        "comment",
        "freqtripid",
        "roadtrip_end_aid",
        "tstopid_start",
    ]
);

/// One stop within a trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripStop {
    pub id: i64,
    pub trip_id: i64,
    pub odo_total: Option<i64>,
    pub odo_trip: Option<i64>,
    pub time_stop: Option<i64>,
    pub time_continue: Option<i64>,
    pub location_id: Option<i64>,
    pub area_id: Option<i64>,
    pub via_id: Option<i64>,
    /// Free-text description, used in place of a location when none is set.
    pub comment: Option<String>,
    pub flag_sides: i64,
}

impl TripStop {
    /// Bit in [`flag_sides`](Self::flag_sides) marking a fuel stop.
    pub const FLAG_FUEL: i64 = 0x01;

    /// Whether this stop carries a fuel purchase.
    pub fn is_fuel_stop(&self) -> bool {
        self.flag_sides & Self::FLAG_FUEL != 0
    }

    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            trip_id: row.i64("tripid")?,
            odo_total: row.opt_i64("odo_total")?,
            odo_trip: row.opt_i64("odo_trip")?,
            time_stop: row.opt_i64("time_stop")?,
            time_continue: row.opt_i64("time_continue")?,
            location_id: row.opt_id("locid")?,
            area_id: row.opt_id("a_id")?,
            via_id: row.opt_id("via_id")?,
            comment: row.opt_text("comment")?,
            flag_sides: row.opt_i64("flag_sides")?.unwrap_or(0),
        })
    }
}

entity_impl!(
    TripStop,
    "tstop",
    TripStop,
    [
        "tripid",
        "odo_total",
        "odo_trip",
        "time_stop",
        "time_continue",
        "locid",
        "a_id",
        "via_id",
        "comment",
        "flag_sides",
    ]
);

/// Fuel purchase at a stop. Shares its `_id` with the owning [`TripStop`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripStopGas {
    pub id: i64,
    pub quantity: i64,
    pub price_per: Option<i64>,
    pub price_total: i64,
    pub fillup: bool,
    pub vehicle_id: Option<i64>,
    pub brand_grade_id: Option<i64>,
}

impl TripStopGas {
    fn read(row: &Row) -> Result<Self, RecordError> {
        Ok(Self {
            id: row.id()?,
            quantity: row.i64("quant")?,
            price_per: row.opt_i64("price_per")?,
            price_total: row.i64("price_total")?,
            fillup: row.flag("fillup")?,
            vehicle_id: row.opt_id("vid")?,
            brand_grade_id: row.opt_id("gas_brandgrade_id")?,
        })
    }
}

entity_impl!(
    TripStopGas,
    "tstop_gas",
    TripStopGas,
    [
        "quant",
        "price_per",
        "price_total",
        "fillup",
        "vid",
        "gas_brandgrade_id",
    ]
);

/// Any entity record, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record")]
pub enum Record {
    VehicleMake(VehicleMake),
    Vehicle(Vehicle),
    Person(Person),
    GeoArea(GeoArea),
    Location(Location),
    ViaRoute(ViaRoute),
    GasBrandGrade(GasBrandGrade),
    FreqTrip(FreqTrip),
    FreqTripStop(FreqTripStop),
    Trip(Trip),
    TripStop(TripStop),
    TripStopGas(TripStopGas),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::VehicleMake(_) => RecordKind::VehicleMake,
            Record::Vehicle(_) => RecordKind::Vehicle,
            Record::Person(_) => RecordKind::Person,
            Record::GeoArea(_) => RecordKind::GeoArea,
            Record::Location(_) => RecordKind::Location,
            Record::ViaRoute(_) => RecordKind::ViaRoute,
            Record::GasBrandGrade(_) => RecordKind::GasBrandGrade,
            Record::FreqTrip(_) => RecordKind::FreqTrip,
            Record::FreqTripStop(_) => RecordKind::FreqTripStop,
            Record::Trip(_) => RecordKind::Trip,
            Record::TripStop(_) => RecordKind::TripStop,
            Record::TripStopGas(_) => RecordKind::TripStopGas,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::VehicleMake(r) => r.id,
            Record::Vehicle(r) => r.id,
            Record::Person(r) => r.id,
            Record::GeoArea(r) => r.id,
            Record::Location(r) => r.id,
            Record::ViaRoute(r) => r.id,
            Record::GasBrandGrade(r) => r.id,
            Record::FreqTrip(r) => r.id,
            Record::FreqTripStop(r) => r.id,
            Record::Trip(r) => r.id,
            Record::TripStop(r) => r.id,
            Record::TripStopGas(r) => r.id,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}
