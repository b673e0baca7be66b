/*
[INPUT]:  2-character id prefix and the wall clock
[OUTPUT]: Client order ids tagging this process run's orders
[POS]:    Data layer - order correlation
[UPDATE]: When the id layout or length changes
*/

use rand::Rng;

/// Total id length: prefix, dash, 8 tag chars, 13-digit millisecond
/// timestamp, lowercase pad.
const ID_LEN: usize = 34;
const TAG_LEN: usize = 8;
const TAG_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PAD_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Generate the process-wide client order id.
///
/// One id is minted per run and reused on every order the engine places;
/// the user-data routers filter their streams on it.
pub fn client_order_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(ID_LEN);
    id.push_str(prefix);
    id.push('-');
    for _ in 0..TAG_LEN {
        id.push(TAG_CHARSET[rng.gen_range(0..TAG_CHARSET.len())] as char);
    }
    id.push_str(&chrono::Utc::now().timestamp_millis().to_string());
    while id.len() < ID_LEN {
        id.push(PAD_CHARSET[rng.gen_range(0..PAD_CHARSET.len())] as char);
    }
    id
}
