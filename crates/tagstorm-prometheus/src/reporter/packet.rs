/// Split text exposition output into UDP payloads of at most `max_size` bytes.
///
/// Comment lines (`# HELP`, `# TYPE`) and blank lines are skipped; samples are never split.
/// Returns the packets and the number of sample lines too long to fit in any packet.
pub fn packetize(text: &str, max_size: usize) -> (Vec<Vec<u8>>, usize) {
    let mut packets = Vec::new();
    let mut oversized = 0;
    let mut buf = String::with_capacity(max_size);

    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.len() > max_size {
            oversized += 1;
            continue;
        }
        let needed = if buf.is_empty() { line.len() } else { buf.len() + 1 + line.len() };
        if needed > max_size {
            packets.push(std::mem::take(&mut buf).into_bytes());
        }
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(line);
    }
    if !buf.is_empty() {
        packets.push(buf.into_bytes());
    }
    (packets, oversized)
}
