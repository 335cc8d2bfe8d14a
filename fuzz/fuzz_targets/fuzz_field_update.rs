#![no_main]
use libfuzzer_sys::fuzz_target;
use teslagram::vehicle::Vehicle;

fuzz_target!(|data: &[u8]| {
    // First line is the topic, the rest is the payload
    let split = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let (topic, payload) = data.split_at(split);
    let payload = payload.get(1..).unwrap_or_default();
    let topic = String::from_utf8_lossy(topic);

    if let Some(update) = teslagram::mqtt::decode_publish("teslamate", &topic, payload) {
        let mut vehicle = Vehicle::new(update.vehicle_id);
        let _ = vehicle.apply_field_update(&update.field, &update.value);
        let _ = vehicle.evaluate();
    }
});
