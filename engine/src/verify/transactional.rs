//! Transactional-data pass: trips, their stops, and fuel purchases.

use tracing::debug;
use triplog_core::{
    Entity, FailedItem, FreqTrip, GasBrandGrade, GeoArea, Location, Person, RecordKind, RowStore,
    Trip, TripStop, TripStopGas, Vehicle, ViaRoute,
};

use super::pass::Pass;
use crate::error::Result;

pub(crate) fn run<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (trips, _) = pass.scan::<Trip>()?;
    for trip in &trips {
        if pass.full() {
            debug!(trip = trip.id, "Failure collector full, transactional pass stopped");
            break;
        }
        check_trip(pass, trip)?;
        if !pass.full() {
            check_stops(pass, trip)?;
        }
    }
    Ok(())
}

fn check_trip<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>, trip: &Trip) -> Result<()> {
    pass.require::<Vehicle, _>(trip.vehicle_id, trip, "Vehicle")?;
    pass.require::<Person, _>(trip.driver_id, trip, "driver Person")?;
    pass.require::<GeoArea, _>(trip.area_id, trip, "GeoArea")?;
    pass.optional::<FreqTrip, _>(trip.freq_trip_id, trip, "FreqTrip")?;
    pass.optional::<GeoArea, _>(trip.roadtrip_end_area_id, trip, "roadtrip destination GeoArea")?;
    if let Some(stop_id) = trip.start_stop_id {
        if let Some(stop) = pass.require_direct::<TripStop, _>(stop_id, trip, "starting TStop")? {
            pass.require::<Trip, _>(stop.trip_id, &stop, "Trip of starting TStop")?;
        }
    }
    Ok(())
}

fn check_stops<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>, trip: &Trip) -> Result<()> {
    let stops = pass.scan_where::<TripStop>("tripid", trip.id)?;
    // Location of the previous stop; the outer None marks the first stop
    // and the stop after an unreadable one.
    let mut previous: Option<Option<i64>> = None;
    for stop in &stops {
        if pass.full() {
            break;
        }
        let Some(stop) = stop else {
            previous = None;
            continue;
        };
        match stop.location_id {
            Some(location_id) => {
                pass.require::<Location, _>(location_id, stop, "Location")?;
            }
            None if stop.comment.as_deref().is_none_or(|c| c.trim().is_empty()) => {
                pass.report(FailedItem::record(
                    stop.clone().into_record(),
                    None,
                    "TStop has neither a Location nor a description",
                ));
            }
            None => {}
        }
        pass.optional::<GeoArea, _>(stop.area_id, stop, "GeoArea")?;
        if let Some(via_id) = stop.via_id {
            check_route(pass, stop, via_id, previous)?;
        }
        if stop.is_fuel_stop() {
            check_fuel(pass, trip, stop)?;
        }
        previous = Some(stop.location_id);
    }
    Ok(())
}

/// A stop's route must end at the stop and start where the previous stop
/// was. The start is not checked on a trip's first stop or on the stop after
/// an unreadable one.
fn check_route<S: RowStore + ?Sized>(
    pass: &mut Pass<'_, S>,
    stop: &TripStop,
    via_id: i64,
    previous: Option<Option<i64>>,
) -> Result<()> {
    let route = pass.caches.lookup::<ViaRoute, S>(pass.store, via_id)?.cloned();
    let Some(route) = route else {
        pass.report(FailedItem::unresolved(
            RecordKind::ViaRoute,
            via_id,
            Some(stop.clone().into_record()),
            "Can't load ViaRoute",
        ));
        return Ok(());
    };
    if Some(route.to_location_id) != stop.location_id {
        pass.report(FailedItem::record(
            stop.clone().into_record(),
            Some(route.clone().into_record()),
            format!(
                "ViaRoute ends at Location {}, not at the TStop's Location",
                route.to_location_id
            ),
        ));
    }
    if let Some(previous_location) = previous {
        if Some(route.from_location_id) != previous_location {
            pass.report(FailedItem::record(
                stop.clone().into_record(),
                Some(route.clone().into_record()),
                format!(
                    "ViaRoute starts at Location {}, not at the previous TStop's Location",
                    route.from_location_id
                ),
            ));
        }
    }
    Ok(())
}

fn check_fuel<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>, trip: &Trip, stop: &TripStop) -> Result<()> {
    let Some(gas) = pass.load::<TripStopGas>(stop.id)? else {
        pass.report(FailedItem::unresolved(
            TripStopGas::KIND,
            stop.id,
            Some(stop.clone().into_record()),
            "Can't load TStopGas for fuel stop",
        ));
        return Ok(());
    };
    if gas.vehicle_id != Some(trip.vehicle_id) {
        pass.report(FailedItem::record(
            gas.clone().into_record(),
            Some(trip.clone().into_record()),
            "TStopGas vehicle doesn't match its Trip",
        ));
    }
    pass.optional::<GasBrandGrade, _>(gas.brand_grade_id, &gas, "GasBrandGrade")?;
    Ok(())
}
