// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PikoBridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Field table for the Kostal PIKO MP plus `/all.xml` status page

use crate::schema::FieldDescriptor;

/// Status page served by the inverter's embedded web server
pub const STATUS_ENDPOINT: &str = "/all.xml";

/// Object id of the connection indicator
pub const CONNECTION_STATE_ID: &str = "info.connection";

macro_rules! measurement {
    ($id:literal, $name:literal, $role:literal) => {
        FieldDescriptor::new(
            concat!("Measurements.", $id),
            $name,
            concat!("//Device/Measurements/Measurement[@Type='", $id, "']/@Value"),
        )
        .number()
        .unit(concat!("//Device/Measurements/Measurement[@Type='", $id, "']/@Unit"))
        .role($role)
    };
}

macro_rules! device {
    ($attr:literal, $name:literal, $role:literal) => {
        FieldDescriptor::new(
            concat!("Device.", $attr),
            $name,
            concat!("//Device/@", $attr),
        )
        .role($role)
    };
}

/// All fields published for a PIKO MP plus, in publication order
pub static PIKO_MP_PLUS_FIELDS: &[FieldDescriptor] = &[
    // Device information
    device!("Name", "Device name", "info.name"),
    device!("Type", "Device type", "info.type"),
    device!("Platform", "Platform", "info.hardware"),
    device!("HmiPlatform", "HMI platform", "info.hardware"),
    device!("NominalPower", "Nominal power", "value.power").number(),
    device!("UserPowerLimit", "User power limit", "value.power"),
    device!("CountryPowerLimit", "Country power limit", "value.power"),
    device!("Serial", "Serial number", "info.serial"),
    device!("OEMSerial", "OEM serial number", "info.serial"),
    device!("BusAddress", "Bus address", "info.address").number(),
    device!("NetBiosName", "NetBIOS name", "info.name"),
    device!("WebPortal", "Web portal", "text"),
    device!("ManufacturerURL", "Manufacturer URL", "text.url"),
    device!("IpAddress", "IP address", "info.ip"),
    device!("DateTime", "Device time", "date"),
    // Live measurements
    measurement!("AC_Voltage", "AC voltage", "value.voltage"),
    measurement!("AC_Current", "AC current", "value.current"),
    measurement!("AC_Power", "AC power", "value.power"),
    measurement!("AC_Power_fast", "AC power (fast)", "value.power"),
    measurement!("AC_Frequency", "AC frequency", "value.frequency"),
    measurement!("DC_Voltage", "DC voltage", "value.voltage"),
    measurement!("DC_Current", "DC current", "value.current"),
    measurement!("LINK_Voltage", "DC link voltage", "value.voltage"),
    measurement!("GridPower", "Grid power", "value.power"),
    measurement!("GridConsumedPower", "Grid consumed power", "value.power.consumption"),
    measurement!("GridInjectedPower", "Grid injected power", "value.power.produced"),
    measurement!("OwnConsumedPower", "Own consumed power", "value.power.consumption"),
    measurement!("Derating", "Derating", "value"),
    // Energy yields
    FieldDescriptor::new(
        "Yields.Produced.Total",
        "Total produced energy",
        "//Device/Yields/Yield[@Type='Produced'][@Slot='Total']/YieldValue/@Value",
    )
    .number()
    .unit("//Device/Yields/Yield[@Type='Produced'][@Slot='Total']/@Unit")
    .role("value.energy.produced"),
    FieldDescriptor::new(
        "Yields.Produced.Total.TimeStamp",
        "Total produced energy timestamp",
        "//Device/Yields/Yield[@Type='Produced'][@Slot='Total']/YieldValue/@TimeStamp",
    )
    .role("date"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, SemanticType};

    #[test]
    fn test_builtin_schema_is_valid() {
        let schema = FieldSchema::new(PIKO_MP_PLUS_FIELDS).unwrap();
        assert_eq!(schema.len(), PIKO_MP_PLUS_FIELDS.len());
    }

    #[test]
    fn test_measurement_macro_expansion() {
        let schema = FieldSchema::new(PIKO_MP_PLUS_FIELDS).unwrap();
        let field = schema.get("Measurements.AC_Power").unwrap();

        assert_eq!(field.descriptor.semantic_type, SemanticType::Number);
        assert_eq!(
            field.descriptor.value_selector,
            "//Device/Measurements/Measurement[@Type='AC_Power']/@Value"
        );
        assert_eq!(
            field.descriptor.unit_selector,
            Some("//Device/Measurements/Measurement[@Type='AC_Power']/@Unit")
        );
        assert_eq!(field.descriptor.role, "value.power");
    }

    #[test]
    fn test_device_fields_have_no_unit() {
        let schema = FieldSchema::new(PIKO_MP_PLUS_FIELDS).unwrap();
        let serial = schema.get("Device.Serial").unwrap();
        assert_eq!(serial.descriptor.value_selector, "//Device/@Serial");
        assert!(serial.unit.is_none());
        assert_eq!(serial.descriptor.semantic_type, SemanticType::String);
    }

    #[test]
    fn test_connection_id_is_not_a_field() {
        assert!(
            PIKO_MP_PLUS_FIELDS
                .iter()
                .all(|field| field.id != CONNECTION_STATE_ID)
        );
    }
}
