//! In-process network of parties used by protocol tests
//!
//! Every party runs its own driver in a thread, a router thread moves messages between them.
//! Once a party aborts, the router closes the input channels of all parties, so that the parties
//! waiting for messages of the aborted one stop as well.
use crate::protocol::{Message, PartyId};
use crate::round::{Session, StartFunc};
use crate::state_machine::sync_channels::StateMachine;
use crate::Error;
use crossbeam_channel::{Receiver, Select, Sender};
use std::thread;

/// Modifies a message on its way to the given recipient
pub(crate) type Tamper = Box<dyn Fn(&PartyId, &mut Message) + Send>;

struct Node {
    party: PartyId,
    egress: Receiver<Message>,
    ingress: Sender<Message>,
}

/// Runs the protocol among the parties and returns their outcomes in the same order
pub(crate) fn run<S>(
    parties: Vec<(PartyId, StartFunc<S>)>,
    session_id: &[u8],
    tamper: Option<Tamper>,
) -> Vec<Result<S::Output, Error>>
where
    S: Session + 'static,
    S::Output: Send + 'static,
{
    let mut nodes = Vec::new();
    let mut handles = Vec::new();
    let (abort, aborted) = crossbeam_channel::unbounded();

    for (party, start) in parties {
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();
        let session_id = session_id.to_vec();
        let abort = abort.clone();
        let id = party.clone();
        log::info!("starting party {}", party);
        handles.push(thread::spawn(move || {
            let result = start(&session_id).and_then(|session| {
                StateMachine::new(session, &rx, &tx)
                    .execute()
                    .unwrap_or_else(|| Err(Error::Protocol("input channel closed".to_string())))
            });
            if result.is_err() {
                let _ = abort.send(id);
            }
            result
        }));
        nodes.push(Node {
            party,
            egress,
            ingress,
        });
    }

    drop(abort);
    let _router = thread::spawn(move || route(nodes, aborted, tamper));

    handles
        .into_iter()
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| Err(Error::Protocol("party thread panicked".to_string())))
        })
        .collect()
}

fn route(mut nodes: Vec<Node>, aborted: Receiver<PartyId>, tamper: Option<Tamper>) {
    while !nodes.is_empty() {
        let (index, received) = {
            let mut select = Select::new();
            nodes.iter().for_each(|node| {
                select.recv(&node.egress);
            });
            let abort = select.recv(&aborted);
            let operation = select.select();
            let index = operation.index();
            if index == abort {
                if let Ok(party) = operation.recv(&aborted) {
                    log::warn!("{} aborted, the network is closed", party);
                }
                // messages sent before the abort still reach their recipients
                for (index, node) in nodes.iter().enumerate() {
                    while let Ok(message) = node.egress.try_recv() {
                        deliver(&nodes, index, &message, &tamper);
                    }
                }
                // dropping the nodes closes every input channel
                return;
            }
            (index, operation.recv(&nodes[index].egress))
        };
        match received {
            Ok(message) => deliver(&nodes, index, &message, &tamper),
            Err(_) => {
                // the party is done
                nodes.remove(index);
            }
        }
    }
}

fn deliver(nodes: &[Node], source: usize, message: &Message, tamper: &Option<Tamper>) {
    let source = &nodes[source].party;
    nodes
        .iter()
        .filter(|node| node.party != *source && message.is_for(&node.party))
        .for_each(|node| {
            let mut delivered = message.clone();
            if let Some(tamper) = tamper {
                tamper(&node.party, &mut delivered);
            }
            log::trace!(
                "round {} message from {} to {}",
                delivered.round_number,
                source,
                node.party
            );
            // the recipient might have aborted already
            let _ = node.ingress.send(delivered);
        });
}
