//! Command dispatch
//!
//! Maps a request frame's command code to its handler through a fixed
//! table. Handlers write the response payload and return an [`ErrorCode`]
//! on failure, which becomes a NAK. The dispatcher keeps no state of its
//! own; everything a handler touches comes in through [`DispatchContext`].

use sensortest_hal::Clock;
use sensortest_protocol::commands::*;
use sensortest_protocol::{ErrorCode, Frame};

use crate::config::BenchConfig;
use crate::registry::SensorRegistry;
use crate::report::TestReport;
use crate::runner::{RunnerError, TestRunner};
use crate::sensor::{SensorFault, SensorId, SPEC_SIZE};

/// State a handler may read or mutate
pub struct DispatchContext<'a, 's> {
    pub runner: &'a mut TestRunner,
    pub sensors: &'a mut SensorRegistry<'s>,
    pub clock: &'a dyn Clock,
    pub config: &'a BenchConfig,
}

type Handler = fn(&Frame, &mut Frame, &mut DispatchContext<'_, '_>) -> Result<(), ErrorCode>;

const HANDLERS: &[(u8, Handler)] = &[
    (CMD_PING, handle_ping),
    (CMD_GET_SENSOR_LIST, handle_get_sensor_list),
    (CMD_TEST_ALL, handle_test_all),
    (CMD_TEST_SINGLE, handle_test_single),
    (CMD_START_ALL_ASYNC, handle_start_all_async),
    (CMD_START_SINGLE_ASYNC, handle_start_single_async),
    (CMD_GET_STATUS, handle_get_status),
    (CMD_GET_REPORT, handle_get_report),
    (CMD_CANCEL, handle_cancel),
    (CMD_SET_SPEC, handle_set_spec),
    (CMD_GET_SPEC, handle_get_spec),
];

/// Handle one request
///
/// Returns the response frame to transmit, or `None` when no response is
/// due. Every request currently gets a response.
pub fn process(request: &Frame, ctx: &mut DispatchContext<'_, '_>) -> Option<Frame> {
    let Some(handler) = lookup(request.command) else {
        warn!("Unknown command {=u8:#x}", request.command);
        return Some(build_nak(ErrorCode::UnknownCommand));
    };

    let mut response = Frame::empty(RSP_ACK);
    match handler(request, &mut response, ctx) {
        Ok(()) => Some(response),
        Err(code) => {
            debug!("Command {=u8:#x} rejected: {}", request.command, code);
            Some(build_nak(code))
        }
    }
}

/// A NAK carrying `code`
pub fn build_nak(code: ErrorCode) -> Frame {
    let mut frame = Frame::empty(RSP_NAK);
    // One byte always fits an empty payload
    let _ = frame.push_u8(code.to_byte());
    frame
}

/// An ACK echoing the request's command code
pub fn build_ack(command: u8) -> Frame {
    let mut frame = Frame::empty(RSP_ACK);
    let _ = frame.push_u8(command);
    frame
}

fn lookup(command: u8) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(code, _)| *code == command)
        .map(|(_, handler)| *handler)
}

fn expect_empty(request: &Frame) -> Result<(), ErrorCode> {
    if request.payload.is_empty() {
        Ok(())
    } else {
        Err(ErrorCode::InvalidPayload)
    }
}

/// Payload must be exactly one known sensor id
fn sensor_arg(request: &Frame) -> Result<SensorId, ErrorCode> {
    match request.payload[..] {
        [byte] => SensorId::from_byte(byte).ok_or(ErrorCode::InvalidSensorId),
        _ => Err(ErrorCode::InvalidPayload),
    }
}

fn runner_error(err: RunnerError) -> ErrorCode {
    match err {
        RunnerError::Busy => ErrorCode::Busy,
        RunnerError::UnknownSensor => ErrorCode::InvalidSensorId,
        RunnerError::NoReport => ErrorCode::NoReport,
    }
}

fn spec_error(fault: SensorFault) -> ErrorCode {
    match fault {
        SensorFault::Unsupported => ErrorCode::NotSupported,
        _ => ErrorCode::InvalidPayload,
    }
}

fn write_report(
    report: &TestReport,
    response: &mut Frame,
    ctx: &DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    response.command = RSP_TEST_RESULT;
    report
        .serialize_into(&*ctx.sensors, response)
        .map_err(|_| ErrorCode::ReportTooLarge)
}

fn handle_ping(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    response.command = RSP_PONG;
    response
        .push_bytes(&ctx.config.version.to_bytes())
        .map_err(|_| ErrorCode::ReportTooLarge)
}

fn handle_get_sensor_list(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    response.command = RSP_SENSOR_LIST;

    let mut write = || -> Result<(), sensortest_protocol::CapacityError> {
        response.push_u8(ctx.sensors.len() as u8)?;
        for sensor in ctx.sensors.iter() {
            let name = sensor.name().as_bytes();
            response.push_u8(sensor.id().to_byte())?;
            response.push_u8(name.len() as u8)?;
            response.push_bytes(name)?;
        }
        Ok(())
    };
    write().map_err(|_| ErrorCode::ReportTooLarge)
}

fn handle_test_all(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    let report = ctx
        .runner
        .run_all(ctx.sensors, ctx.clock)
        .map_err(runner_error)?;
    write_report(&report, response, ctx)
}

fn handle_test_single(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    let id = sensor_arg(request)?;
    if !ctx.sensors.contains(id) {
        return Err(ErrorCode::InvalidSensorId);
    }
    let report = ctx
        .runner
        .run_single(id, ctx.sensors, ctx.clock)
        .map_err(runner_error)?;
    write_report(&report, response, ctx)
}

fn handle_start_all_async(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    ctx.runner
        .start_all_async(ctx.sensors, ctx.clock)
        .map_err(runner_error)?;
    *response = build_ack(request.command);
    Ok(())
}

fn handle_start_single_async(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    let id = sensor_arg(request)?;
    ctx.runner
        .start_single_async(id, ctx.sensors, ctx.clock)
        .map_err(runner_error)?;
    *response = build_ack(request.command);
    Ok(())
}

fn handle_get_status(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    *response = Frame::empty(RSP_STATUS);
    response
        .push_bytes(&[
            ctx.runner.state().to_byte(),
            ctx.runner.mode().to_byte(),
            ctx.runner.progress() as u8,
            ctx.sensors.len() as u8,
        ])
        .map_err(|_| ErrorCode::ReportTooLarge)
}

fn handle_get_report(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    let report = ctx.runner.take_report().map_err(runner_error)?;
    write_report(&report, response, ctx)
}

fn handle_cancel(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    expect_empty(request)?;
    ctx.runner.cancel();
    *response = build_ack(request.command);
    Ok(())
}

fn handle_set_spec(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    let (&id_byte, spec_bytes) = request
        .payload
        .split_first()
        .ok_or(ErrorCode::InvalidPayload)?;
    let id = SensorId::from_byte(id_byte).ok_or(ErrorCode::InvalidSensorId)?;
    let driver = ctx
        .sensors
        .by_id_mut(id)
        .ok_or(ErrorCode::InvalidSensorId)?;

    let spec = driver.parse_spec(spec_bytes).map_err(spec_error)?;
    driver.set_spec(spec).map_err(spec_error)?;
    info!("Spec updated for sensor {}", id);

    *response = build_ack(request.command);
    Ok(())
}

fn handle_get_spec(
    request: &Frame,
    response: &mut Frame,
    ctx: &mut DispatchContext<'_, '_>,
) -> Result<(), ErrorCode> {
    let id = sensor_arg(request)?;
    let driver = ctx.sensors.by_id(id).ok_or(ErrorCode::InvalidSensorId)?;

    if !driver.supports_spec() {
        return Err(ErrorCode::NotSupported);
    }
    let spec = driver.get_spec().ok_or(ErrorCode::NoSpec)?;

    let mut bytes = [0u8; SPEC_SIZE * 2];
    let len = driver
        .serialize_spec(&spec, &mut bytes)
        .ok_or(ErrorCode::NotSupported)?;

    *response = Frame::empty(RSP_SPEC_DATA);
    response
        .push_u8(id.to_byte())
        .and_then(|_| response.push_bytes(&bytes[..len]))
        .map_err(|_| ErrorCode::ReportTooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{SensorDriver, SensorSpec, TestOutcome, TestStatus};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_ms(&self) -> u32 {
            0x0000_1000
        }
    }

    #[derive(Default)]
    struct Ranging {
        spec: Option<SensorSpec>,
    }

    impl SensorDriver for Ranging {
        fn id(&self) -> SensorId {
            SensorId::Vl53l0x
        }

        fn name(&self) -> &'static str {
            "VL53L0X"
        }

        fn supports_spec(&self) -> bool {
            true
        }

        fn set_spec(&mut self, spec: SensorSpec) -> Result<(), SensorFault> {
            self.spec = Some(spec);
            Ok(())
        }

        fn get_spec(&self) -> Option<SensorSpec> {
            self.spec
        }

        fn run_test(&mut self) -> Option<TestOutcome> {
            Some(TestOutcome::status_only(TestStatus::Pass))
        }

        fn serialize_spec(&self, spec: &SensorSpec, out: &mut [u8]) -> Option<usize> {
            crate::sensor::write_bytes(&spec.to_bytes(), out)
        }

        fn parse_spec(&self, bytes: &[u8]) -> Result<SensorSpec, SensorFault> {
            SensorSpec::ranging_from_bytes(bytes)
        }
    }

    struct Plain;

    impl SensorDriver for Plain {
        fn id(&self) -> SensorId {
            SensorId::Mlx90640
        }

        fn name(&self) -> &'static str {
            "MLX90640"
        }
    }

    fn dispatch(
        request: &Frame,
        runner: &mut TestRunner,
        sensors: &mut SensorRegistry<'_>,
    ) -> Frame {
        let config = BenchConfig::default();
        let mut ctx = DispatchContext {
            runner,
            sensors,
            clock: &FixedClock,
            config: &config,
        };
        process(request, &mut ctx).unwrap()
    }

    fn nak(code: ErrorCode) -> Frame {
        Frame::new(RSP_NAK, &[code.to_byte()]).unwrap()
    }

    #[test]
    fn test_every_command_has_one_handler() {
        for cmd in Command::ALL {
            let count = HANDLERS
                .iter()
                .filter(|(code, _)| *code == cmd.to_byte())
                .count();
            assert_eq!(count, 1, "command {:?}", cmd);
        }
        assert_eq!(HANDLERS.len(), Command::ALL.len());
    }

    #[test]
    fn test_build_nak() {
        let frame = build_nak(ErrorCode::CrcFail);
        assert_eq!(frame.command, RSP_NAK);
        assert_eq!(&frame.payload[..], &[0x04]);
    }

    #[test]
    fn test_unknown_command() {
        let mut runner = TestRunner::new();
        let mut sensors = SensorRegistry::new();
        let response = dispatch(&Frame::empty(0x7E), &mut runner, &mut sensors);
        assert_eq!(response, nak(ErrorCode::UnknownCommand));
    }

    #[test]
    fn test_ping() {
        let mut runner = TestRunner::new();
        let mut sensors = SensorRegistry::new();
        let response = dispatch(&Frame::empty(CMD_PING), &mut runner, &mut sensors);
        assert_eq!(response, Frame::new(RSP_PONG, &[1, 0, 0]).unwrap());

        let response = dispatch(
            &Frame::new(CMD_PING, &[0]).unwrap(),
            &mut runner,
            &mut sensors,
        );
        assert_eq!(response, nak(ErrorCode::InvalidPayload));
    }

    #[test]
    fn test_sensor_list() {
        let mut a = Plain;
        let mut b = Ranging::default();
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut a).unwrap();
        sensors.register(&mut b).unwrap();

        let mut runner = TestRunner::new();
        let response = dispatch(&Frame::empty(CMD_GET_SENSOR_LIST), &mut runner, &mut sensors);

        let mut expected = Frame::empty(RSP_SENSOR_LIST);
        expected.push_u8(2).unwrap();
        expected.push_bytes(&[0x01, 8]).unwrap();
        expected.push_bytes(b"MLX90640").unwrap();
        expected.push_bytes(&[0x02, 7]).unwrap();
        expected.push_bytes(b"VL53L0X").unwrap();
        assert_eq!(response, expected);
    }

    #[test]
    fn test_test_single_validates_id() {
        let mut a = Plain;
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut a).unwrap();
        let mut runner = TestRunner::new();

        let bad_id = Frame::new(CMD_TEST_SINGLE, &[0x09]).unwrap();
        assert_eq!(
            dispatch(&bad_id, &mut runner, &mut sensors),
            nak(ErrorCode::InvalidSensorId)
        );

        let unfitted = Frame::new(CMD_TEST_SINGLE, &[0x02]).unwrap();
        assert_eq!(
            dispatch(&unfitted, &mut runner, &mut sensors),
            nak(ErrorCode::InvalidSensorId)
        );

        let missing = Frame::empty(CMD_TEST_SINGLE);
        assert_eq!(
            dispatch(&missing, &mut runner, &mut sensors),
            nak(ErrorCode::InvalidPayload)
        );
    }

    #[test]
    fn test_test_single_report() {
        let mut a = Plain;
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut a).unwrap();
        let mut runner = TestRunner::new();

        let request = Frame::new(CMD_TEST_SINGLE, &[0x01]).unwrap();
        let response = dispatch(&request, &mut runner, &mut sensors);

        assert_eq!(response.command, RSP_TEST_RESULT);
        assert_eq!(
            &response.payload[..9],
            &[1, 0, 0, 0x00, 0x00, 0x10, 0x00, 0x01, 0x06]
        );
        assert_eq!(response.payload_len(), 17);
    }

    #[test]
    fn test_async_flow_and_busy() {
        let mut b = Ranging {
            spec: Some(SensorSpec::Ranging {
                target_dist: 100,
                tolerance: 5,
            }),
        };
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut b).unwrap();
        let mut runner = TestRunner::new();

        let start = Frame::new(CMD_START_SINGLE_ASYNC, &[0x02]).unwrap();
        assert_eq!(
            dispatch(&start, &mut runner, &mut sensors),
            build_ack(CMD_START_SINGLE_ASYNC)
        );
        assert_eq!(
            dispatch(&start, &mut runner, &mut sensors),
            nak(ErrorCode::Busy)
        );
        assert_eq!(
            dispatch(&Frame::empty(CMD_TEST_ALL), &mut runner, &mut sensors),
            nak(ErrorCode::Busy)
        );
        assert_eq!(
            dispatch(&Frame::empty(CMD_GET_REPORT), &mut runner, &mut sensors),
            nak(ErrorCode::NoReport)
        );

        let status = dispatch(&Frame::empty(CMD_GET_STATUS), &mut runner, &mut sensors);
        assert_eq!(status, Frame::new(RSP_STATUS, &[1, 2, 0, 1]).unwrap());

        runner.process_async(&mut sensors);

        let status = dispatch(&Frame::empty(CMD_GET_STATUS), &mut runner, &mut sensors);
        assert_eq!(status, Frame::new(RSP_STATUS, &[2, 2, 1, 1]).unwrap());

        let report = dispatch(&Frame::empty(CMD_GET_REPORT), &mut runner, &mut sensors);
        assert_eq!(report.command, RSP_TEST_RESULT);
        assert_eq!(&report.payload[..3], &[1, 1, 0]);

        assert_eq!(
            dispatch(&Frame::empty(CMD_GET_REPORT), &mut runner, &mut sensors),
            nak(ErrorCode::NoReport)
        );
    }

    #[test]
    fn test_start_single_async_unknown_sensor() {
        let mut runner = TestRunner::new();
        let mut sensors = SensorRegistry::new();
        let start = Frame::new(CMD_START_SINGLE_ASYNC, &[0x01]).unwrap();
        assert_eq!(
            dispatch(&start, &mut runner, &mut sensors),
            nak(ErrorCode::InvalidSensorId)
        );
    }

    #[test]
    fn test_cancel_acks_even_when_idle() {
        let mut runner = TestRunner::new();
        let mut sensors = SensorRegistry::new();
        assert_eq!(
            dispatch(&Frame::empty(CMD_CANCEL), &mut runner, &mut sensors),
            build_ack(CMD_CANCEL)
        );
    }

    #[test]
    fn test_spec_set_and_get() {
        let mut b = Ranging::default();
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut b).unwrap();
        let mut runner = TestRunner::new();

        let get = Frame::new(CMD_GET_SPEC, &[0x02]).unwrap();
        assert_eq!(
            dispatch(&get, &mut runner, &mut sensors),
            nak(ErrorCode::NoSpec)
        );

        let set = Frame::new(CMD_SET_SPEC, &[0x02, 0x01, 0xF4, 0x00, 0x32]).unwrap();
        assert_eq!(
            dispatch(&set, &mut runner, &mut sensors),
            build_ack(CMD_SET_SPEC)
        );

        assert_eq!(
            dispatch(&get, &mut runner, &mut sensors),
            Frame::new(RSP_SPEC_DATA, &[0x02, 0x01, 0xF4, 0x00, 0x32]).unwrap()
        );

        let short = Frame::new(CMD_SET_SPEC, &[0x02, 0x01]).unwrap();
        assert_eq!(
            dispatch(&short, &mut runner, &mut sensors),
            nak(ErrorCode::InvalidPayload)
        );
    }

    #[test]
    fn test_spec_unsupported() {
        let mut a = Plain;
        let mut sensors = SensorRegistry::new();
        sensors.register(&mut a).unwrap();
        let mut runner = TestRunner::new();

        let set = Frame::new(CMD_SET_SPEC, &[0x01, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            dispatch(&set, &mut runner, &mut sensors),
            nak(ErrorCode::NotSupported)
        );

        let get = Frame::new(CMD_GET_SPEC, &[0x01]).unwrap();
        assert_eq!(
            dispatch(&get, &mut runner, &mut sensors),
            nak(ErrorCode::NotSupported)
        );
    }
}
