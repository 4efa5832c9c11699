//! Datapoint type table and registry.
//!
//! The registry maps `(main, sub)` numbers to [`DptInfo`] entries. It is an
//! ordinary value: build one with [`DatapointRegistry::standard`] at startup
//! and hand a reference to whatever needs to decode datapoints.
//!
//! ```
//! use knx_netip::dpt::{DatapointRegistry, DatapointValue};
//!
//! let registry = DatapointRegistry::standard();
//!
//! let mut temperature = registry.create_type(9, 1)?;
//! temperature.set_value(&DatapointValue::Number(21.5))?;
//! assert_eq!(temperature.bytes(), &[0x0C, 0x33]);
//!
//! // Unknown sub types fall back to the generic entry of the main type
//! let generic = registry.create_type(9, 999)?;
//! assert_eq!(generic.sub_type(), 0);
//! # Ok::<(), knx_netip::KnxError>(())
//! ```

use crate::dpt::{DatapointType, DptId};
use crate::error::{KnxError, Result};
use std::collections::BTreeMap;

/// Byte layout of a datapoint type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Encoding {
    /// DPT 1: one bit
    Bit,
    /// DPT 2: control bit and value bit
    ControlledBit,
    /// DPT 3: control bit and 3-bit step code
    ControlledStep,
    /// DPT 4: one character
    Character,
    /// DPT 5, 17: unsigned byte
    Unsigned8,
    /// DPT 6: signed byte
    Signed8,
    /// DPT 6.020: five status bits and a one-hot mode
    StatusMode,
    /// DPT 7: unsigned 16-bit
    Unsigned16,
    /// DPT 8: signed 16-bit
    Signed16,
    /// DPT 9: KNX 2-byte float
    Float16,
    /// DPT 10: day of week and time of day
    TimeOfDay,
    /// DPT 11: date
    Date,
    /// DPT 12: unsigned 32-bit
    Unsigned32,
    /// DPT 13: signed 32-bit
    Signed32,
    /// DPT 14: IEEE 754 single
    Float32,
    /// DPT 15: entrance access data
    AccessData,
    /// DPT 16: 14-character string
    String14,
    /// DPT 18: scene number with learn bit
    SceneControl,
    /// DPT 19: date and time with quality flags
    DateTime,
    /// DPT 20: one byte enumeration
    Enum8,
    /// DPT 21: 8-bit set
    BitSet8,
    /// DPT 22: 16-bit set
    BitSet16,
    /// DPT 23: 2-bit set
    TwoBitSet,
    /// DPT 24: zero terminated ISO 8859-1 string
    VarString,
    /// DPT 26: scene number with inactive bit
    SceneInfo,
    /// DPT 27: 32-bit set
    BitSet32,
    /// DPT 28: zero terminated UTF-8 string
    Utf8String,
    /// DPT 29: signed 64-bit
    Signed64,
}

impl Encoding {
    /// Size in bytes, 0 for variable sized encodings
    pub const fn size(self) -> usize {
        match self {
            Encoding::Bit
            | Encoding::ControlledBit
            | Encoding::ControlledStep
            | Encoding::Character
            | Encoding::Unsigned8
            | Encoding::Signed8
            | Encoding::StatusMode
            | Encoding::SceneControl
            | Encoding::Enum8
            | Encoding::BitSet8
            | Encoding::TwoBitSet
            | Encoding::SceneInfo => 1,
            Encoding::Unsigned16 | Encoding::Signed16 | Encoding::Float16 | Encoding::BitSet16 => 2,
            Encoding::TimeOfDay | Encoding::Date => 3,
            Encoding::Unsigned32 | Encoding::Signed32 | Encoding::Float32 | Encoding::AccessData | Encoding::BitSet32 => 4,
            Encoding::DateTime | Encoding::Signed64 => 8,
            Encoding::String14 => 14,
            Encoding::VarString | Encoding::Utf8String => 0,
        }
    }

    /// Whether the byte length varies with the value
    pub const fn is_variable(self) -> bool {
        self.size() == 0
    }
}

/// Engineering range of a datapoint type.
///
/// A raw value `r` stands for `r * coefficient`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Range {
    /// Smallest engineering value
    pub minimum: f64,
    /// Largest engineering value
    pub maximum: f64,
    /// Engineering units per raw step
    pub coefficient: f64,
}

impl Range {
    /// Range with an explicit coefficient
    pub const fn new(minimum: f64, maximum: f64, coefficient: f64) -> Self {
        Self { minimum, maximum, coefficient }
    }

    /// Whether raw values are scaled
    pub fn is_scaled(&self) -> bool {
        (self.coefficient - 1.0).abs() > f64::EPSILON
    }

    /// Whether `value` lies inside the range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    /// Smallest and largest raw value
    pub fn raw_bounds(&self) -> (f64, f64) {
        ((self.minimum / self.coefficient).round(), (self.maximum / self.coefficient).round())
    }
}

/// One registered datapoint type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DptInfo {
    /// Main number
    pub main: u16,
    /// Sub number, 0 for the generic entry of the main type
    pub sub: u16,
    /// KNX name, e.g. `DPT_Value_Temp`
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Unit symbol, empty if dimensionless
    pub unit: &'static str,
    /// Byte layout
    pub encoding: Encoding,
    /// Engineering range
    pub range: Range,
}

impl DptInfo {
    /// Identifier of this entry
    pub const fn id(&self) -> DptId {
        DptId::new(self.main, self.sub)
    }
}

macro_rules! dpt_table {
    (@coef) => { 1.0 };
    (@coef $coef:expr) => { $coef };
    ($($main:literal . $sub:literal $enc:ident $name:literal $desc:literal $unit:literal [$min:expr, $max:expr $(, $coef:expr)?];)*) => {
        &[$(DptInfo {
            main: $main,
            sub: $sub,
            name: $name,
            description: $desc,
            unit: $unit,
            encoding: Encoding::$enc,
            range: Range::new($min, $max, dpt_table!(@coef $($coef)?)),
        },)*]
    };
}

const U8: f64 = 255.0;
const I8_MIN: f64 = -128.0;
const I8_MAX: f64 = 127.0;
const U16: f64 = 65_535.0;
const I16_MIN: f64 = -32_768.0;
const I16_MAX: f64 = 32_767.0;
const U32: f64 = 4_294_967_295.0;
const I32_MIN: f64 = -2_147_483_648.0;
const I32_MAX: f64 = 2_147_483_647.0;
const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX: f64 = 9_223_372_036_854_775_807.0;
const F16_MIN: f64 = -671_088.64;
const F16_MAX: f64 = 670_760.96;
const F32_MIN: f64 = -3.402_823_466_385_288_6e38;
const F32_MAX: f64 = 3.402_823_466_385_288_6e38;
const SCALING: f64 = 100.0 / 255.0;
const ANGLE: f64 = 360.0 / 255.0;

/// Every built-in datapoint type, one `main . sub` entry per line.
pub static STANDARD_TYPES: &[DptInfo] = dpt_table! {
    1 . 0 Bit "DPT_1Bit" "1-bit" "" [0.0, 1.0];
    1 . 1 Bit "DPT_Switch" "Switch off/on" "" [0.0, 1.0];
    1 . 2 Bit "DPT_Bool" "Boolean" "" [0.0, 1.0];
    1 . 3 Bit "DPT_Enable" "Enable" "" [0.0, 1.0];
    1 . 4 Bit "DPT_Ramp" "Ramp" "" [0.0, 1.0];
    1 . 5 Bit "DPT_Alarm" "Alarm" "" [0.0, 1.0];
    1 . 6 Bit "DPT_BinaryValue" "Binary value low/high" "" [0.0, 1.0];
    1 . 7 Bit "DPT_Step" "Step decrease/increase" "" [0.0, 1.0];
    1 . 8 Bit "DPT_UpDown" "Up/down" "" [0.0, 1.0];
    1 . 9 Bit "DPT_OpenClose" "Open/close" "" [0.0, 1.0];
    1 . 10 Bit "DPT_Start" "Stop/start" "" [0.0, 1.0];
    1 . 11 Bit "DPT_State" "Inactive/active" "" [0.0, 1.0];
    1 . 12 Bit "DPT_Invert" "Not inverted/inverted" "" [0.0, 1.0];
    1 . 13 Bit "DPT_DimSendStyle" "Start-stop/cyclic" "" [0.0, 1.0];
    1 . 14 Bit "DPT_InputSource" "Fixed/calculated" "" [0.0, 1.0];
    1 . 15 Bit "DPT_Reset" "No action/reset" "" [0.0, 1.0];
    1 . 16 Bit "DPT_Ack" "No action/acknowledge" "" [0.0, 1.0];
    1 . 17 Bit "DPT_Trigger" "Trigger" "" [0.0, 1.0];
    1 . 18 Bit "DPT_Occupancy" "Not occupied/occupied" "" [0.0, 1.0];
    1 . 19 Bit "DPT_Window_Door" "Closed/open" "" [0.0, 1.0];
    1 . 21 Bit "DPT_LogicalFunction" "OR/AND" "" [0.0, 1.0];
    1 . 22 Bit "DPT_Scene_AB" "Scene A/B" "" [0.0, 1.0];
    1 . 23 Bit "DPT_ShutterBlinds_Mode" "Up-down only/up-down and step-stop" "" [0.0, 1.0];
    1 . 100 Bit "DPT_Heat_Cool" "Cooling/heating" "" [0.0, 1.0];

    2 . 0 ControlledBit "DPT_1BitControlled" "1-bit controlled" "" [0.0, 3.0];
    2 . 1 ControlledBit "DPT_Switch_Control" "Switch control" "" [0.0, 3.0];
    2 . 2 ControlledBit "DPT_Bool_Control" "Boolean control" "" [0.0, 3.0];
    2 . 3 ControlledBit "DPT_Enable_Control" "Enable control" "" [0.0, 3.0];
    2 . 4 ControlledBit "DPT_Ramp_Control" "Ramp control" "" [0.0, 3.0];
    2 . 5 ControlledBit "DPT_Alarm_Control" "Alarm control" "" [0.0, 3.0];
    2 . 6 ControlledBit "DPT_BinaryValue_Control" "Binary value control" "" [0.0, 3.0];
    2 . 7 ControlledBit "DPT_Step_Control" "Step control" "" [0.0, 3.0];
    2 . 8 ControlledBit "DPT_Direction1_Control" "Direction 1 control" "" [0.0, 3.0];
    2 . 9 ControlledBit "DPT_Direction2_Control" "Direction 2 control" "" [0.0, 3.0];
    2 . 10 ControlledBit "DPT_Start_Control" "Start control" "" [0.0, 3.0];
    2 . 11 ControlledBit "DPT_State_Control" "State control" "" [0.0, 3.0];
    2 . 12 ControlledBit "DPT_Invert_Control" "Invert control" "" [0.0, 3.0];

    3 . 0 ControlledStep "DPT_3BitControlled" "3-bit controlled" "" [0.0, 7.0];
    3 . 7 ControlledStep "DPT_Control_Dimming" "Dimming control" "" [0.0, 7.0];
    3 . 8 ControlledStep "DPT_Control_Blinds" "Blinds control" "" [0.0, 7.0];

    4 . 0 Character "DPT_Char" "Character" "" [0.0, 255.0];
    4 . 1 Character "DPT_Char_ASCII" "ASCII character" "" [0.0, 127.0];
    4 . 2 Character "DPT_Char_8859_1" "ISO 8859-1 character" "" [0.0, 255.0];

    5 . 0 Unsigned8 "DPT_8BitUnsigned" "8-bit unsigned value" "" [0.0, U8];
    5 . 1 Unsigned8 "DPT_Scaling" "Percentage" "%" [0.0, 100.0, SCALING];
    5 . 3 Unsigned8 "DPT_Angle" "Angle" "°" [0.0, 360.0, ANGLE];
    5 . 4 Unsigned8 "DPT_Percent_U8" "Percentage 0..255" "%" [0.0, U8];
    5 . 5 Unsigned8 "DPT_DecimalFactor" "Ratio" "ratio" [0.0, U8];
    5 . 6 Unsigned8 "DPT_Tariff" "Tariff" "" [0.0, 254.0];
    5 . 10 Unsigned8 "DPT_Value_1_Ucount" "Counter pulses" "counter pulses" [0.0, U8];

    6 . 0 Signed8 "DPT_8BitSigned" "8-bit signed value" "" [I8_MIN, I8_MAX];
    6 . 1 Signed8 "DPT_Percent_V8" "Percentage -128..127" "%" [I8_MIN, I8_MAX];
    6 . 10 Signed8 "DPT_Value_1_Count" "Counter pulses" "counter pulses" [I8_MIN, I8_MAX];
    6 . 20 StatusMode "DPT_Status_Mode3" "Status with mode" "" [0.0, U8];

    7 . 0 Unsigned16 "DPT_2ByteUnsigned" "2-byte unsigned value" "" [0.0, U16];
    7 . 1 Unsigned16 "DPT_Value_2_Ucount" "Pulses" "pulses" [0.0, U16];
    7 . 2 Unsigned16 "DPT_TimePeriodMsec" "Time period" "ms" [0.0, U16];
    7 . 3 Unsigned16 "DPT_TimePeriod10MSec" "Time period 10 ms resolution" "ms" [0.0, 655_350.0, 10.0];
    7 . 4 Unsigned16 "DPT_TimePeriod100MSec" "Time period 100 ms resolution" "ms" [0.0, 6_553_500.0, 100.0];
    7 . 5 Unsigned16 "DPT_TimePeriodSec" "Time period" "s" [0.0, U16];
    7 . 6 Unsigned16 "DPT_TimePeriodMin" "Time period" "min" [0.0, U16];
    7 . 7 Unsigned16 "DPT_TimePeriodHrs" "Time period" "h" [0.0, U16];
    7 . 10 Unsigned16 "DPT_PropDataType" "Interface object property data type" "" [0.0, U16];
    7 . 11 Unsigned16 "DPT_Length_mm" "Length" "mm" [0.0, U16];
    7 . 12 Unsigned16 "DPT_UElCurrentmA" "Bus power supply current" "mA" [0.0, U16];
    7 . 13 Unsigned16 "DPT_Brightness" "Brightness" "lx" [0.0, U16];

    8 . 0 Signed16 "DPT_2ByteSigned" "2-byte signed value" "" [I16_MIN, I16_MAX];
    8 . 1 Signed16 "DPT_Value_2_Count" "Pulses difference" "pulses" [I16_MIN, I16_MAX];
    8 . 2 Signed16 "DPT_DeltaTimeMsec" "Time lag" "ms" [I16_MIN, I16_MAX];
    8 . 3 Signed16 "DPT_DeltaTime10MSec" "Time lag 10 ms resolution" "ms" [-327_680.0, 327_670.0, 10.0];
    8 . 4 Signed16 "DPT_DeltaTime100MSec" "Time lag 100 ms resolution" "ms" [-3_276_800.0, 3_276_700.0, 100.0];
    8 . 5 Signed16 "DPT_DeltaTimeSec" "Time lag" "s" [I16_MIN, I16_MAX];
    8 . 6 Signed16 "DPT_DeltaTimeMin" "Time lag" "min" [I16_MIN, I16_MAX];
    8 . 7 Signed16 "DPT_DeltaTimeHrs" "Time lag" "h" [I16_MIN, I16_MAX];
    8 . 10 Signed16 "DPT_Percent_V16" "Percentage difference" "%" [-327.68, 327.67, 0.01];
    8 . 11 Signed16 "DPT_Rotation_Angle" "Rotation angle" "°" [I16_MIN, I16_MAX];

    9 . 0 Float16 "DPT_2ByteFloat" "2-byte float value" "" [F16_MIN, F16_MAX];
    9 . 1 Float16 "DPT_Value_Temp" "Temperature" "°C" [-273.0, 670_760.0];
    9 . 2 Float16 "DPT_Value_Tempd" "Temperature difference" "K" [-670_760.0, 670_760.0];
    9 . 3 Float16 "DPT_Value_Tempa" "Kelvin per hour" "K/h" [-670_760.0, 670_760.0];
    9 . 4 Float16 "DPT_Value_Lux" "Illuminance" "lx" [0.0, 670_760.0];
    9 . 5 Float16 "DPT_Value_Wsp" "Wind speed" "m/s" [0.0, 670_760.0];
    9 . 6 Float16 "DPT_Value_Pres" "Pressure" "Pa" [0.0, 670_760.0];
    9 . 7 Float16 "DPT_Value_Humidity" "Humidity" "%" [0.0, 670_760.0];
    9 . 8 Float16 "DPT_Value_AirQuality" "Air quality" "ppm" [0.0, 670_760.0];
    9 . 9 Float16 "DPT_Value_AirFlow" "Air flow" "m³/h" [-670_760.0, 670_760.0];
    9 . 10 Float16 "DPT_Value_Time1" "Time" "s" [-670_760.0, 670_760.0];
    9 . 11 Float16 "DPT_Value_Time2" "Time" "ms" [-670_760.0, 670_760.0];
    9 . 20 Float16 "DPT_Value_Volt" "Voltage" "mV" [-670_760.0, 670_760.0];
    9 . 21 Float16 "DPT_Value_Curr" "Current" "mA" [-670_760.0, 670_760.0];
    9 . 22 Float16 "DPT_PowerDensity" "Power density" "W/m²" [-670_760.0, 670_760.0];
    9 . 23 Float16 "DPT_KelvinPerPercent" "Kelvin per percent" "K/%" [-670_760.0, 670_760.0];
    9 . 24 Float16 "DPT_Power" "Power" "kW" [-670_760.0, 670_760.0];
    9 . 25 Float16 "DPT_Value_Volume_Flow" "Volume flow" "l/h" [-670_760.0, 670_760.0];
    9 . 26 Float16 "DPT_Rain_Amount" "Amount of rain" "l/m²" [-671_088.64, 670_760.96];
    9 . 27 Float16 "DPT_Value_Temp_F" "Temperature" "°F" [-459.6, 670_760.96];
    9 . 28 Float16 "DPT_Value_Wsp_kmh" "Wind speed" "km/h" [0.0, 670_760.96];
    9 . 29 Float16 "DPT_Value_Absolute_Humidity" "Absolute humidity" "g/m³" [0.0, 670_760.0];
    9 . 30 Float16 "DPT_Concentration_ygm3" "Concentration" "µg/m³" [0.0, 670_760.0];

    10 . 1 TimeOfDay "DPT_TimeOfDay" "Time of day" "" [0.0, 0.0];
    11 . 1 Date "DPT_Date" "Date" "" [0.0, 0.0];

    12 . 0 Unsigned32 "DPT_4ByteUnsigned" "4-byte unsigned value" "" [0.0, U32];
    12 . 1 Unsigned32 "DPT_Value_4_Ucount" "Counter pulses" "counter pulses" [0.0, U32];

    13 . 0 Signed32 "DPT_4ByteSigned" "4-byte signed value" "" [I32_MIN, I32_MAX];
    13 . 1 Signed32 "DPT_Value_4_Count" "Counter pulses" "counter pulses" [I32_MIN, I32_MAX];
    13 . 2 Signed32 "DPT_FlowRate_m3/h" "Flow rate" "m³/h" [-214_748.3648, 214_748.3647, 0.0001];
    13 . 10 Signed32 "DPT_ActiveEnergy" "Active energy" "Wh" [I32_MIN, I32_MAX];
    13 . 11 Signed32 "DPT_ApparantEnergy" "Apparent energy" "VAh" [I32_MIN, I32_MAX];
    13 . 12 Signed32 "DPT_ReactiveEnergy" "Reactive energy" "VARh" [I32_MIN, I32_MAX];
    13 . 13 Signed32 "DPT_ActiveEnergy_kWh" "Active energy" "kWh" [I32_MIN, I32_MAX];
    13 . 14 Signed32 "DPT_ApparantEnergy_kVAh" "Apparent energy" "kVAh" [I32_MIN, I32_MAX];
    13 . 15 Signed32 "DPT_ReactiveEnergy_kVARh" "Reactive energy" "kVARh" [I32_MIN, I32_MAX];
    13 . 100 Signed32 "DPT_LongDeltaTimeSec" "Long time lag" "s" [I32_MIN, I32_MAX];

    14 . 0 Float32 "DPT_Value_Acceleration" "Acceleration" "m/s²" [F32_MIN, F32_MAX];
    14 . 1 Float32 "DPT_Value_Acceleration_Angular" "Angular acceleration" "rad/s²" [F32_MIN, F32_MAX];
    14 . 2 Float32 "DPT_Value_Activation_Energy" "Activation energy" "J/mol" [F32_MIN, F32_MAX];
    14 . 3 Float32 "DPT_Value_Activity" "Radioactive activity" "1/s" [F32_MIN, F32_MAX];
    14 . 4 Float32 "DPT_Value_Mol" "Amount of substance" "mol" [F32_MIN, F32_MAX];
    14 . 5 Float32 "DPT_Value_Amplitude" "Amplitude" "" [F32_MIN, F32_MAX];
    14 . 6 Float32 "DPT_Value_AngleRad" "Angle" "rad" [F32_MIN, F32_MAX];
    14 . 7 Float32 "DPT_Value_AngleDeg" "Angle" "°" [F32_MIN, F32_MAX];
    14 . 8 Float32 "DPT_Value_Angular_Momentum" "Angular momentum" "Js" [F32_MIN, F32_MAX];
    14 . 9 Float32 "DPT_Value_Angular_Velocity" "Angular velocity" "rad/s" [F32_MIN, F32_MAX];
    14 . 10 Float32 "DPT_Value_Area" "Area" "m²" [F32_MIN, F32_MAX];
    14 . 11 Float32 "DPT_Value_Capacitance" "Capacitance" "F" [F32_MIN, F32_MAX];
    14 . 12 Float32 "DPT_Value_Charge_DensitySurface" "Surface charge density" "C/m²" [F32_MIN, F32_MAX];
    14 . 13 Float32 "DPT_Value_Charge_DensityVolume" "Volume charge density" "C/m³" [F32_MIN, F32_MAX];
    14 . 14 Float32 "DPT_Value_Compressibility" "Compressibility" "m²/N" [F32_MIN, F32_MAX];
    14 . 15 Float32 "DPT_Value_Conductance" "Conductance" "S" [F32_MIN, F32_MAX];
    14 . 16 Float32 "DPT_Value_Electrical_Conductivity" "Conductivity" "S/m" [F32_MIN, F32_MAX];
    14 . 17 Float32 "DPT_Value_Density" "Density" "kg/m³" [F32_MIN, F32_MAX];
    14 . 18 Float32 "DPT_Value_Electric_Charge" "Electric charge" "C" [F32_MIN, F32_MAX];
    14 . 19 Float32 "DPT_Value_Electric_Current" "Electric current" "A" [F32_MIN, F32_MAX];
    14 . 20 Float32 "DPT_Value_Electric_CurrentDensity" "Electric current density" "A/m²" [F32_MIN, F32_MAX];
    14 . 21 Float32 "DPT_Value_Electric_DipoleMoment" "Electric dipole moment" "Cm" [F32_MIN, F32_MAX];
    14 . 22 Float32 "DPT_Value_Electric_Displacement" "Electric displacement" "C/m²" [F32_MIN, F32_MAX];
    14 . 23 Float32 "DPT_Value_Electric_FieldStrength" "Electric field strength" "V/m" [F32_MIN, F32_MAX];
    14 . 24 Float32 "DPT_Value_Electric_Flux" "Electric flux" "Vm" [F32_MIN, F32_MAX];
    14 . 25 Float32 "DPT_Value_Electric_FluxDensity" "Electric flux density" "C/m²" [F32_MIN, F32_MAX];
    14 . 26 Float32 "DPT_Value_Electric_Polarization" "Electric polarization" "C/m²" [F32_MIN, F32_MAX];
    14 . 27 Float32 "DPT_Value_Electric_Potential" "Electric potential" "V" [F32_MIN, F32_MAX];
    14 . 28 Float32 "DPT_Value_Electric_PotentialDifference" "Electric potential difference" "V" [F32_MIN, F32_MAX];
    14 . 29 Float32 "DPT_Value_ElectromagneticMoment" "Electromagnetic moment" "Am²" [F32_MIN, F32_MAX];
    14 . 30 Float32 "DPT_Value_Electromotive_Force" "Electromotive force" "V" [F32_MIN, F32_MAX];
    14 . 31 Float32 "DPT_Value_Energy" "Energy" "J" [F32_MIN, F32_MAX];
    14 . 32 Float32 "DPT_Value_Force" "Force" "N" [F32_MIN, F32_MAX];
    14 . 33 Float32 "DPT_Value_Frequency" "Frequency" "Hz" [F32_MIN, F32_MAX];
    14 . 34 Float32 "DPT_Value_Angular_Frequency" "Angular frequency" "rad/s" [F32_MIN, F32_MAX];
    14 . 35 Float32 "DPT_Value_Heat_Capacity" "Heat capacity" "J/K" [F32_MIN, F32_MAX];
    14 . 36 Float32 "DPT_Value_Heat_FlowRate" "Heat flow rate" "W" [F32_MIN, F32_MAX];
    14 . 37 Float32 "DPT_Value_Heat_Quantity" "Heat quantity" "J" [F32_MIN, F32_MAX];
    14 . 38 Float32 "DPT_Value_Impedance" "Impedance" "Ω" [F32_MIN, F32_MAX];
    14 . 39 Float32 "DPT_Value_Length" "Length" "m" [F32_MIN, F32_MAX];
    14 . 40 Float32 "DPT_Value_Light_Quantity" "Light quantity" "J" [F32_MIN, F32_MAX];
    14 . 41 Float32 "DPT_Value_Luminance" "Luminance" "cd/m²" [F32_MIN, F32_MAX];
    14 . 42 Float32 "DPT_Value_Luminous_Flux" "Luminous flux" "lm" [F32_MIN, F32_MAX];
    14 . 43 Float32 "DPT_Value_Luminous_Intensity" "Luminous intensity" "cd" [F32_MIN, F32_MAX];
    14 . 44 Float32 "DPT_Value_Magnetic_FieldStrength" "Magnetic field strength" "A/m" [F32_MIN, F32_MAX];
    14 . 45 Float32 "DPT_Value_Magnetic_Flux" "Magnetic flux" "Wb" [F32_MIN, F32_MAX];
    14 . 46 Float32 "DPT_Value_Magnetic_FluxDensity" "Magnetic flux density" "T" [F32_MIN, F32_MAX];
    14 . 47 Float32 "DPT_Value_Magnetic_Moment" "Magnetic moment" "Am²" [F32_MIN, F32_MAX];
    14 . 48 Float32 "DPT_Value_Magnetic_Polarization" "Magnetic polarization" "T" [F32_MIN, F32_MAX];
    14 . 49 Float32 "DPT_Value_Magnetization" "Magnetization" "A/m" [F32_MIN, F32_MAX];
    14 . 50 Float32 "DPT_Value_MagnetomotiveForce" "Magnetomotive force" "A" [F32_MIN, F32_MAX];
    14 . 51 Float32 "DPT_Value_Mass" "Mass" "kg" [F32_MIN, F32_MAX];
    14 . 52 Float32 "DPT_Value_MassFlux" "Mass flux" "kg/s" [F32_MIN, F32_MAX];
    14 . 53 Float32 "DPT_Value_Momentum" "Momentum" "N/s" [F32_MIN, F32_MAX];
    14 . 54 Float32 "DPT_Value_Phase_AngleRad" "Phase angle" "rad" [F32_MIN, F32_MAX];
    14 . 55 Float32 "DPT_Value_Phase_AngleDeg" "Phase angle" "°" [F32_MIN, F32_MAX];
    14 . 56 Float32 "DPT_Value_Power" "Power" "W" [F32_MIN, F32_MAX];
    14 . 57 Float32 "DPT_Value_Power_Factor" "Power factor" "cos Φ" [F32_MIN, F32_MAX];
    14 . 58 Float32 "DPT_Value_Pressure" "Pressure" "Pa" [F32_MIN, F32_MAX];
    14 . 59 Float32 "DPT_Value_Reactance" "Reactance" "Ω" [F32_MIN, F32_MAX];
    14 . 60 Float32 "DPT_Value_Resistance" "Resistance" "Ω" [F32_MIN, F32_MAX];
    14 . 61 Float32 "DPT_Value_Resistivity" "Resistivity" "Ωm" [F32_MIN, F32_MAX];
    14 . 62 Float32 "DPT_Value_SelfInductance" "Self inductance" "H" [F32_MIN, F32_MAX];
    14 . 63 Float32 "DPT_Value_SolidAngle" "Solid angle" "sr" [F32_MIN, F32_MAX];
    14 . 64 Float32 "DPT_Value_Sound_Intensity" "Sound intensity" "W/m²" [F32_MIN, F32_MAX];
    14 . 65 Float32 "DPT_Value_Speed" "Speed" "m/s" [F32_MIN, F32_MAX];
    14 . 66 Float32 "DPT_Value_Stress" "Stress" "Pa" [F32_MIN, F32_MAX];
    14 . 67 Float32 "DPT_Value_Surface_Tension" "Surface tension" "N/m" [F32_MIN, F32_MAX];
    14 . 68 Float32 "DPT_Value_Common_Temperature" "Temperature" "°C" [F32_MIN, F32_MAX];
    14 . 69 Float32 "DPT_Value_Absolute_Temperature" "Absolute temperature" "K" [F32_MIN, F32_MAX];
    14 . 70 Float32 "DPT_Value_TemperatureDifference" "Temperature difference" "K" [F32_MIN, F32_MAX];
    14 . 71 Float32 "DPT_Value_Thermal_Capacity" "Thermal capacity" "J/K" [F32_MIN, F32_MAX];
    14 . 72 Float32 "DPT_Value_Thermal_Conductivity" "Thermal conductivity" "W/mK" [F32_MIN, F32_MAX];
    14 . 73 Float32 "DPT_Value_ThermoelectricPower" "Thermoelectric power" "V/K" [F32_MIN, F32_MAX];
    14 . 74 Float32 "DPT_Value_Time" "Time" "s" [F32_MIN, F32_MAX];
    14 . 75 Float32 "DPT_Value_Torque" "Torque" "Nm" [F32_MIN, F32_MAX];
    14 . 76 Float32 "DPT_Value_Volume" "Volume" "m³" [F32_MIN, F32_MAX];
    14 . 77 Float32 "DPT_Value_Volume_Flux" "Volume flux" "m³/s" [F32_MIN, F32_MAX];
    14 . 78 Float32 "DPT_Value_Weight" "Weight" "N" [F32_MIN, F32_MAX];
    14 . 79 Float32 "DPT_Value_Work" "Work" "J" [F32_MIN, F32_MAX];

    15 . 0 AccessData "DPT_Access_Data" "Entrance access" "" [0.0, 0.0];

    16 . 0 String14 "DPT_String_ASCII" "ASCII string" "" [0.0, 127.0];
    16 . 1 String14 "DPT_String_8859_1" "ISO 8859-1 string" "" [0.0, 255.0];

    17 . 1 Unsigned8 "DPT_SceneNumber" "Scene number" "" [0.0, 63.0];
    18 . 1 SceneControl "DPT_SceneControl" "Scene control" "" [0.0, 63.0];
    19 . 1 DateTime "DPT_DateTime" "Date and time" "" [0.0, 0.0];

    20 . 0 Enum8 "DPT_1Byte" "1-byte enumeration" "" [0.0, U8];
    20 . 1 Enum8 "DPT_SCLOMode" "SCLO mode" "" [0.0, 3.0];
    20 . 2 Enum8 "DPT_BuildingMode" "Building mode" "" [0.0, 2.0];
    20 . 3 Enum8 "DPT_OccMode" "Occupancy mode" "" [0.0, 2.0];
    20 . 4 Enum8 "DPT_Priority" "Priority" "" [0.0, 3.0];
    20 . 5 Enum8 "DPT_LightApplicationMode" "Light application mode" "" [0.0, 2.0];
    20 . 6 Enum8 "DPT_ApplicationArea" "Application area" "" [0.0, 14.0];
    20 . 7 Enum8 "DPT_AlarmClassType" "Alarm class type" "" [1.0, 3.0];
    20 . 8 Enum8 "DPT_PSUMode" "PSU mode" "" [0.0, 2.0];
    20 . 11 Enum8 "DPT_ErrorClass_System" "System error class" "" [0.0, 18.0];
    20 . 12 Enum8 "DPT_ErrorClass_HVAC" "HVAC error class" "" [0.0, 4.0];
    20 . 13 Enum8 "DPT_Time_Delay" "Time delay" "" [0.0, 25.0];
    20 . 14 Enum8 "DPT_Beaufort_Wind_Force_Scale" "Wind force scale" "" [0.0, 12.0];
    20 . 17 Enum8 "DPT_SensorSelect" "Sensor mode" "" [0.0, 4.0];
    20 . 20 Enum8 "DPT_ActuatorConnectType" "Actuator connect type" "" [1.0, 2.0];
    20 . 21 Enum8 "DPT_Cloud_Cover" "Cloud cover" "okta" [0.0, 9.0];

    21 . 0 BitSet8 "DPT_8BitSet" "8-bit set" "" [0.0, U8];
    21 . 1 BitSet8 "DPT_StatusGen" "General status" "" [0.0, U8];
    21 . 2 BitSet8 "DPT_Device_Control" "Device control" "" [0.0, U8];

    22 . 0 BitSet16 "DPT_16BitSet" "16-bit set" "" [0.0, U16];
    22 . 1000 BitSet16 "DPT_Media" "Supported media" "" [0.0, U16];

    23 . 0 TwoBitSet "DPT_2BitSet" "2-bit set" "" [0.0, 3.0];
    23 . 1 TwoBitSet "DPT_OnOffAction" "On/off action" "" [0.0, 3.0];
    23 . 2 TwoBitSet "DPT_Alarm_Reaction" "Alarm reaction" "" [0.0, 3.0];
    23 . 3 TwoBitSet "DPT_UpDown_Action" "Up/down action" "" [0.0, 3.0];

    24 . 0 VarString "DPT_VarString" "Variable string" "" [0.0, 255.0];
    24 . 1 VarString "DPT_VarString_8859_1" "Variable ISO 8859-1 string" "" [0.0, 255.0];

    26 . 1 SceneInfo "DPT_SceneInfo" "Scene information" "" [0.0, 63.0];

    27 . 0 BitSet32 "DPT_32BitSet" "32-bit set" "" [0.0, U32];
    27 . 1 BitSet32 "DPT_CombinedInfoOnOff" "Combined info on/off" "" [0.0, U32];

    28 . 0 Utf8String "DPT_UTF-8_String" "UTF-8 string" "" [0.0, 0.0];
    28 . 1 Utf8String "DPT_UTF-8" "UTF-8 string" "" [0.0, 0.0];

    29 . 0 Signed64 "DPT_ElectricalEnergy" "8-byte signed value" "" [I64_MIN, I64_MAX];
    29 . 10 Signed64 "DPT_ActiveEnergy_V64" "Active energy" "Wh" [I64_MIN, I64_MAX];
    29 . 11 Signed64 "DPT_ApparantEnergy_V64" "Apparent energy" "VAh" [I64_MIN, I64_MAX];
    29 . 12 Signed64 "DPT_ReactiveEnergy_V64" "Reactive energy" "VARh" [I64_MIN, I64_MAX];
};

/// Datapoint types known to an application.
///
/// Lookups fall back to the generic entry (sub 0) of a main type when the
/// exact sub type is not registered.
#[derive(Debug, Clone, Default)]
pub struct DatapointRegistry {
    types: BTreeMap<u16, BTreeMap<u16, DptInfo>>,
}

impl DatapointRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in type
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for info in STANDARD_TYPES {
            registry.register(*info);
        }
        registry
    }

    /// Add or replace an entry
    pub fn register(&mut self, info: DptInfo) {
        self.types.entry(info.main).or_default().insert(info.sub, info);
    }

    /// Entry for `main.sub`, falling back to `main.000`
    pub fn info(&self, main: u16, sub: u16) -> Option<&DptInfo> {
        let subs = self.types.get(&main)?;
        subs.get(&sub).or_else(|| subs.get(&0))
    }

    /// Datapoint of type `main.sub`, falling back to `main.000`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` if neither is registered.
    pub fn create_type(&self, main: u16, sub: u16) -> Result<DatapointType> {
        self.info(main, sub).map(|info| DatapointType::new(*info)).ok_or_else(KnxError::unknown_dpt)
    }

    /// Datapoint for a numeric identifier whose last five decimal digits are
    /// the sub number and whose leading digits are the main number
    /// (`900_001` is 9.001).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for identifiers below `100_000`, numbers
    /// that do not fit, or unregistered types.
    pub fn create_type_id(&self, id: u32) -> Result<DatapointType> {
        let id = DptId::from_number(id).ok_or_else(KnxError::unknown_dpt)?;
        self.create_type(id.main, id.sub)
    }

    /// Datapoint for a textual identifier (`"9.001"`, `"DPT-9"`, `"DPST-9-1"`).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for malformed or unregistered identifiers.
    pub fn create_type_str(&self, id: &str) -> Result<DatapointType> {
        let id: DptId = id.parse()?;
        self.create_type(id.main, id.sub)
    }

    /// Registered main numbers, ascending
    pub fn main_types(&self) -> Vec<u16> {
        self.types.keys().copied().collect()
    }

    /// Registered sub numbers of `main`, ascending
    pub fn sub_types(&self, main: u16) -> Vec<u16> {
        self.types.get(&main).map(|subs| subs.keys().copied().collect()).unwrap_or_default()
    }

    /// Whether `main` has any entry
    pub fn contains_main_type(&self, main: u16) -> bool {
        self.types.contains_key(&main)
    }

    /// Whether `main.sub` is registered exactly
    pub fn contains_sub_type(&self, main: u16, sub: u16) -> bool {
        self.types.get(&main).is_some_and(|subs| subs.contains_key(&sub))
    }

    /// Byte size shared by the types of `main`, 0 for variable sized types
    pub fn type_size(&self, main: u16) -> Option<usize> {
        self.types.get(&main)?.values().next().map(|info| info.encoding.size())
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.types.values().map(BTreeMap::len).sum()
    }

    /// No entry registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
