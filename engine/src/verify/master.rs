//! Master-data pass: reference integrity of vehicles, locations, routes and
//! frequent trips.

use tracing::debug;
use triplog_core::{
    FailedItem, FreqTrip, FreqTripStop, GasBrandGrade, GeoArea, Location, Person, RowStore, Trip,
    Vehicle, VehicleMake, ViaRoute,
};

use super::pass::Pass;
use crate::error::Result;

pub(crate) fn run<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let checks: [fn(&mut Pass<'_, S>) -> Result<()>; 5] = [
        check_vehicles,
        check_locations,
        check_routes,
        check_freq_trips,
        check_freq_trip_stops,
    ];
    for check in checks {
        if pass.full() {
            debug!("Failure collector full, master-data pass stopped");
            break;
        }
        check(pass)?;
    }
    Ok(())
}

fn check_vehicles<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (vehicles, rows) = pass.scan::<Vehicle>()?;
    if rows == 0 {
        pass.report(FailedItem::database("No vehicles found"));
        return Ok(());
    }
    for vehicle in &vehicles {
        if pass.full() {
            break;
        }
        pass.require_direct::<VehicleMake, _>(vehicle.make_id, vehicle, "VehicleMake")?;
        pass.optional::<Person, _>(vehicle.driver_id, vehicle, "driver Person")?;
        pass.optional::<Trip, _>(vehicle.last_trip_id, vehicle, "last Trip")?;
    }
    Ok(())
}

fn check_locations<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (locations, _) = pass.scan::<Location>()?;
    for location in &locations {
        if pass.full() {
            break;
        }
        pass.optional::<GeoArea, _>(location.area_id, location, "GeoArea")?;
        pass.optional::<GasBrandGrade, _>(
            location.latest_brand_grade_id,
            location,
            "latest GasBrandGrade",
        )?;
    }
    for location in locations {
        pass.caches.locations.prime(location);
    }
    Ok(())
}

fn check_routes<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (routes, _) = pass.scan::<ViaRoute>()?;
    for route in &routes {
        if pass.full() {
            break;
        }
        pass.require::<Location, _>(route.from_location_id, route, "starting Location")?;
        pass.require::<Location, _>(route.to_location_id, route, "ending Location")?;
    }
    for route in routes {
        pass.caches.routes.prime(route);
    }
    Ok(())
}

fn check_freq_trips<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (freq_trips, _) = pass.scan::<FreqTrip>()?;
    for trip in &freq_trips {
        if pass.full() {
            break;
        }
        pass.require::<GeoArea, _>(trip.area_id, trip, "GeoArea")?;
        pass.optional::<Location, _>(trip.start_location_id, trip, "starting Location")?;
        pass.require::<Location, _>(trip.end_location_id, trip, "ending Location")?;
        pass.optional::<ViaRoute, _>(trip.end_via_id, trip, "ending ViaRoute")?;
        pass.optional::<GeoArea, _>(trip.roadtrip_end_area_id, trip, "roadtrip destination GeoArea")?;
    }
    for trip in freq_trips {
        pass.caches.freq_trips.prime(trip);
    }
    Ok(())
}

fn check_freq_trip_stops<S: RowStore + ?Sized>(pass: &mut Pass<'_, S>) -> Result<()> {
    let (stops, _) = pass.scan::<FreqTripStop>()?;
    for stop in &stops {
        if pass.full() {
            break;
        }
        pass.require::<FreqTrip, _>(stop.freq_trip_id, stop, "FreqTrip")?;
        pass.require::<Location, _>(stop.location_id, stop, "Location")?;
        pass.optional::<ViaRoute, _>(stop.via_id, stop, "ViaRoute")?;
    }
    Ok(())
}
