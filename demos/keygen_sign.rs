use anyhow::bail;
use cmp_ecdsa_mpc::ecdsa::keygen::{keygen, KeygenSession};
use cmp_ecdsa_mpc::ecdsa::sign::{sign, SignSession};
use cmp_ecdsa_mpc::pool::Pool;
use cmp_ecdsa_mpc::protocol::{Message, PartyId};
use cmp_ecdsa_mpc::round::{Session, StartFunc};
use cmp_ecdsa_mpc::state_machine::sync_channels::StateMachine;
use cmp_ecdsa_mpc::{Config, Signature};
use crossbeam_channel::{Receiver, Sender};
use curv::arithmetic::traits::Converter;
use curv::elliptic::curves::traits::ECScalar;
use rand::Rng;
use std::sync::Arc;
use std::thread;

const MESSAGE: &[u8] = b"hello";

fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder().try_init();

    let parties = vec![PartyId::from("client-1"), PartyId::from("server-1")];
    let pool = Arc::new(Pool::new(0)?);

    let session_id = rand::thread_rng().gen::<[u8; 32]>();
    let configs: Vec<Config> = execute::<KeygenSession>(
        parties
            .iter()
            .map(|id| (id.clone(), keygen(id, &parties, 1, pool.clone())))
            .collect(),
        &session_id,
    )?;
    for config in &configs {
        println!("{} holds share of public key {:?}", config.id, config.public_key);
    }

    let session_id = rand::thread_rng().gen::<[u8; 32]>();
    let signatures: Vec<Signature> = execute::<SignSession>(
        configs
            .iter()
            .map(|c| (c.id.clone(), sign(c.clone(), &parties, MESSAGE, pool.clone())))
            .collect(),
        &session_id,
    )?;

    let public_key = configs[0].public_key;
    for (party, signature) in parties.iter().zip(signatures.iter()) {
        if !signature.verify_message(&public_key, MESSAGE) {
            bail!("signature of {} does not verify", party);
        }
        println!(
            "{}: r = {}, s = {}",
            party,
            signature.r.to_big_int().to_hex(),
            signature.s.to_big_int().to_hex()
        );
    }
    Ok(())
}

/// runs every party in its own thread, a forwarding thread per party delivers its messages to the others
fn execute<S>(
    parties: Vec<(PartyId, StartFunc<S>)>,
    session_id: &[u8],
) -> anyhow::Result<Vec<S::Output>>
where
    S: Session + 'static,
    S::Output: Send + 'static,
{
    let mut ingresses: Vec<(PartyId, Sender<Message>)> = Vec::new();
    let mut egresses: Vec<Receiver<Message>> = Vec::new();
    let mut handles = Vec::new();
    for (party, start) in parties {
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();
        let session_id = session_id.to_vec();
        log::info!("starting party {}", party);
        handles.push(thread::spawn(move || -> anyhow::Result<S::Output> {
            let session = start(&session_id)?;
            match StateMachine::new(session, &rx, &tx).execute() {
                Some(Ok(output)) => Ok(output),
                Some(Err(e)) => bail!("error {}", e),
                None => bail!("input channel closed"),
            }
        }));
        ingresses.push((party, ingress));
        egresses.push(egress);
    }

    for egress in egresses {
        let ingresses = ingresses.clone();
        thread::spawn(move || {
            for message in egress.iter() {
                ingresses
                    .iter()
                    .filter(|(party, _)| message.is_for(party))
                    .for_each(|(_, ingress)| {
                        let _ = ingress.send(message.clone());
                    });
            }
        });
    }
    // input channels close once every forwarding thread is done
    drop(ingresses);

    handles
        .into_iter()
        .map(|h| match h.join() {
            Ok(result) => result,
            Err(_) => bail!("party thread panicked"),
        })
        .collect()
}
