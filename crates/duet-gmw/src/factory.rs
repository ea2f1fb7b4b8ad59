use std::sync::Arc;

use duet_comm::{CommLayer, PartyId};
use duet_core::BitVec;
use duet_engine::{
    ArithmeticWire, BooleanWire, EngineError, GateFactory, GateRegister, InputPromise,
    Operation, OutputFuture, OutputRecipient, Protocol, Wire, WireVector,
};
use duet_triples::{MtProvider, SbProvider, SpProvider};
use tokio::sync::oneshot;

use crate::{
    arithmetic::{
        ArithmeticAddGate, ArithmeticInputGateReceiver, ArithmeticInputGateSender,
        ArithmeticMulGate, ArithmeticNegGate, ArithmeticOutputGate, ArithmeticSqrGate,
        ArithmeticSubGate,
    },
    boolean::{
        BooleanAndGate, BooleanInputGateReceiver, BooleanInputGateSender, BooleanInvGate,
        BooleanOutputGate, BooleanXorGate,
    },
    circuits,
    context::GmwRing,
    conversion::{ArithmeticShareSplitGate, BooleanToArithmeticGate},
    GmwContext,
};

/// The GMW gate factory: builds and registers Arithmetic- and Boolean-GMW
/// gates and the conversions between them.
pub struct GmwFactory {
    ctx: Arc<GmwContext>,
}

impl GmwFactory {
    /// Creates the factory for one backend instance.
    pub fn new(
        comm: CommLayer,
        register: Arc<GateRegister>,
        mts: Arc<MtProvider>,
        sps: Arc<SpProvider>,
        sbs: Arc<SbProvider>,
    ) -> Self {
        Self {
            ctx: Arc::new(GmwContext {
                comm,
                register,
                mts,
                sps,
                sbs,
            }),
        }
    }

    fn my_id(&self) -> PartyId {
        self.ctx.my_id()
    }

    fn role_mismatch(&self) -> EngineError {
        EngineError::ProtocolRoleMismatch {
            party: self.my_id(),
        }
    }

    // ------------------------------------------------------------------
    // arithmetic gates, generic over the ring
    // ------------------------------------------------------------------

    fn arith_input_my<T: GmwRing>(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<T>, WireVector), EngineError> {
        if owner != self.my_id() {
            return Err(self.role_mismatch());
        }
        let (promise, input) = oneshot::channel();
        let id = self.ctx.register.next_gate_id();
        let output = ArithmeticWire::<T>::new(num_simd);
        self.ctx
            .register
            .register_gate(Box::new(ArithmeticInputGateSender {
                id,
                ctx: Arc::clone(&self.ctx),
                num_simd,
                input: Some(input),
                output: Arc::clone(&output),
                mask: Vec::new(),
            }));
        Ok((promise, vec![T::wrap_wire(output)]))
    }

    fn arith_input_other<T: GmwRing>(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        if owner == self.my_id() {
            return Err(self.role_mismatch());
        }
        let id = self.ctx.register.next_gate_id();
        let output = ArithmeticWire::<T>::new(num_simd);
        self.ctx
            .register
            .register_gate(Box::new(ArithmeticInputGateReceiver {
                id,
                ctx: Arc::clone(&self.ctx),
                num_simd,
                output: Arc::clone(&output),
            }));
        Ok(vec![T::wrap_wire(output)])
    }

    fn arith_output_my<T: GmwRing>(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<T>, EngineError> {
        if !recipient.includes(self.my_id()) {
            return Err(self.role_mismatch());
        }
        let input = single_arith_wire::<T>(wires)?;
        let (sender, future) = oneshot::channel();
        let id = self.ctx.register.next_gate_id();
        self.ctx
            .register
            .register_gate(Box::new(ArithmeticOutputGate {
                id,
                ctx: Arc::clone(&self.ctx),
                input,
                recipient,
                result: Some(sender),
            }));
        Ok(future)
    }

    fn arith_output_other_typed<T: GmwRing>(
        &self,
        recipient: PartyId,
        wires: &[Wire],
    ) -> Result<(), EngineError> {
        let input = single_arith_wire::<T>(wires)?;
        let id = self.ctx.register.next_gate_id();
        self.ctx
            .register
            .register_gate(Box::new(ArithmeticOutputGate::<T> {
                id,
                ctx: Arc::clone(&self.ctx),
                input,
                recipient: OutputRecipient::Party(recipient),
                result: None,
            }));
        Ok(())
    }

    fn arith_unary<T: GmwRing>(
        &self,
        op: Operation,
        wires: &[Wire],
    ) -> Result<WireVector, EngineError> {
        let input = single_arith_wire::<T>(wires)?;
        let num_simd = input.num_simd();
        let id = self.ctx.register.next_gate_id();
        let output = ArithmeticWire::<T>::new(num_simd);
        match op {
            Operation::Neg => {
                self.ctx.register.register_gate(Box::new(ArithmeticNegGate {
                    id,
                    input,
                    output: Arc::clone(&output),
                }));
            }
            Operation::Sqr => {
                let sp_offset = self.ctx.sps.request_sps::<T>(num_simd)?;
                self.ctx.register.register_gate(Box::new(ArithmeticSqrGate {
                    id,
                    ctx: Arc::clone(&self.ctx),
                    num_simd,
                    input,
                    output: Arc::clone(&output),
                    sp_offset,
                    pairs: None,
                }));
            }
            op => {
                return Err(EngineError::UnsupportedOperation {
                    op,
                    protocol: Protocol::ArithmeticGmw,
                })
            }
        }
        Ok(vec![T::wrap_wire(output)])
    }

    fn arith_binary<T: GmwRing>(
        &self,
        op: Operation,
        a: &[Wire],
        b: &[Wire],
    ) -> Result<WireVector, EngineError> {
        let a = single_arith_wire::<T>(a)?;
        let b = single_arith_wire::<T>(b)?;
        if a.num_simd() != b.num_simd() {
            return Err(EngineError::InternalInvariant(
                "operands have different SIMD widths".into(),
            ));
        }
        let num_simd = a.num_simd();
        let id = self.ctx.register.next_gate_id();
        let output = ArithmeticWire::<T>::new(num_simd);
        match op {
            Operation::Add => {
                self.ctx.register.register_gate(Box::new(ArithmeticAddGate {
                    id,
                    a,
                    b,
                    output: Arc::clone(&output),
                }));
            }
            Operation::Sub => {
                self.ctx.register.register_gate(Box::new(ArithmeticSubGate {
                    id,
                    a,
                    b,
                    output: Arc::clone(&output),
                }));
            }
            Operation::Mul => {
                let mt_offset = self.ctx.mts.request_mts::<T>(num_simd)?;
                self.ctx.register.register_gate(Box::new(ArithmeticMulGate {
                    id,
                    ctx: Arc::clone(&self.ctx),
                    num_simd,
                    a,
                    b,
                    output: Arc::clone(&output),
                    mt_offset,
                    triples: None,
                }));
            }
            op => {
                return Err(EngineError::UnsupportedOperation {
                    op,
                    protocol: Protocol::ArithmeticGmw,
                })
            }
        }
        Ok(vec![T::wrap_wire(output)])
    }

    fn arith_unary_dispatch(
        &self,
        op: Operation,
        wires: &[Wire],
    ) -> Result<WireVector, EngineError> {
        match arith_bit_size(wires)? {
            8 => self.arith_unary::<u8>(op, wires),
            16 => self.arith_unary::<u16>(op, wires),
            32 => self.arith_unary::<u32>(op, wires),
            64 => self.arith_unary::<u64>(op, wires),
            bits => Err(EngineError::BitSizeMismatch(bits, 64)),
        }
    }

    fn arith_binary_dispatch(
        &self,
        op: Operation,
        a: &[Wire],
        b: &[Wire],
    ) -> Result<WireVector, EngineError> {
        let bits = arith_bit_size(a)?;
        let other = arith_bit_size(b)?;
        if bits != other {
            return Err(EngineError::BitSizeMismatch(bits, other));
        }
        match bits {
            8 => self.arith_binary::<u8>(op, a, b),
            16 => self.arith_binary::<u16>(op, a, b),
            32 => self.arith_binary::<u32>(op, a, b),
            64 => self.arith_binary::<u64>(op, a, b),
            bits => Err(EngineError::BitSizeMismatch(bits, 64)),
        }
    }

    // ------------------------------------------------------------------
    // boolean gates
    // ------------------------------------------------------------------

    fn boolean_unary(&self, op: Operation, wires: &[Wire]) -> Result<WireVector, EngineError> {
        debug_assert_eq!(op, Operation::Inv);
        let inputs = boolean_wires(op, wires)?;
        let id = self.ctx.register.next_gate_id();
        let outputs: Vec<Arc<BooleanWire>> = inputs
            .iter()
            .map(|wire| BooleanWire::new(wire.num_simd()))
            .collect();
        let result = wrap_boolean(&outputs);
        self.ctx.register.register_gate(Box::new(BooleanInvGate {
            id,
            ctx: Arc::clone(&self.ctx),
            inputs,
            outputs,
        }));
        Ok(result)
    }

    fn boolean_binary(
        &self,
        op: Operation,
        a: &[Wire],
        b: &[Wire],
    ) -> Result<WireVector, EngineError> {
        let a = boolean_wires(op, a)?;
        let b = boolean_wires(op, b)?;
        if a.len() != b.len() {
            return Err(EngineError::WireCountMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        let num_simd = check_simd(&a, &b)?;
        let id = self.ctx.register.next_gate_id();
        let outputs: Vec<Arc<BooleanWire>> =
            (0..a.len()).map(|_| BooleanWire::new(num_simd)).collect();
        let result = wrap_boolean(&outputs);
        match op {
            Operation::Xor => {
                self.ctx.register.register_gate(Box::new(BooleanXorGate {
                    id,
                    a,
                    b,
                    outputs,
                }));
            }
            Operation::And => {
                let mt_offset = self.ctx.mts.request_binary_mts(a.len() * num_simd)?;
                self.ctx.register.register_gate(Box::new(BooleanAndGate {
                    id,
                    ctx: Arc::clone(&self.ctx),
                    num_simd,
                    a,
                    b,
                    outputs,
                    mt_offset,
                    triples: None,
                }));
            }
            op => {
                return Err(EngineError::UnsupportedOperation {
                    op,
                    protocol: Protocol::BooleanGmw,
                })
            }
        }
        Ok(result)
    }

    fn convert_to_arithmetic(&self, input: &[Wire]) -> Result<WireVector, EngineError> {
        match input.len() {
            8 => self.b2a::<u8>(input),
            16 => self.b2a::<u16>(input),
            32 => self.b2a::<u32>(input),
            64 => self.b2a::<u64>(input),
            len => Err(EngineError::InternalInvariant(format!(
                "no arithmetic ring matches {len} boolean wires"
            ))),
        }
    }

    fn b2a<T: GmwRing>(&self, input: &[Wire]) -> Result<WireVector, EngineError> {
        let inputs = boolean_wires(Operation::Add, input)?;
        let num_simd = check_simd(&inputs, &inputs)?;
        let sb_offset = self.ctx.sbs.request_sbs::<T>(inputs.len() * num_simd)?;
        let id = self.ctx.register.next_gate_id();
        let output = ArithmeticWire::<T>::new(num_simd);
        self.ctx
            .register
            .register_gate(Box::new(BooleanToArithmeticGate {
                id,
                ctx: Arc::clone(&self.ctx),
                num_simd,
                inputs,
                output: Arc::clone(&output),
                sb_offset,
                shared_bits: None,
            }));
        Ok(vec![T::wrap_wire(output)])
    }

    fn convert_to_boolean(&self, input: &[Wire]) -> Result<WireVector, EngineError> {
        match arith_bit_size(input)? {
            8 => self.a2b::<u8>(input),
            16 => self.a2b::<u16>(input),
            32 => self.a2b::<u32>(input),
            64 => self.a2b::<u64>(input),
            bits => Err(EngineError::BitSizeMismatch(bits, 64)),
        }
    }

    fn a2b<T: GmwRing>(&self, input: &[Wire]) -> Result<WireVector, EngineError> {
        let wire = single_arith_wire::<T>(input)?;
        let num_simd = wire.num_simd();
        let id = self.ctx.register.next_gate_id();
        let outputs: Vec<Arc<BooleanWire>> = (0..2 * T::BITS)
            .map(|_| BooleanWire::new(num_simd))
            .collect();
        self.ctx
            .register
            .register_gate(Box::new(ArithmeticShareSplitGate::<T> {
                id,
                ctx: Arc::clone(&self.ctx),
                input: wire,
                outputs: outputs.clone(),
            }));

        // Boolean addition of the two summands completes the conversion.
        let lhs = wrap_boolean(&outputs[..T::BITS]);
        let rhs = wrap_boolean(&outputs[T::BITS..]);
        circuits::ripple_carry_adder(self, &lhs, &rhs)
    }
}

impl GateFactory for GmwFactory {
    fn protocol(&self) -> Protocol {
        Protocol::ArithmeticGmw
    }

    fn make_arithmetic_8_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u8>, WireVector), EngineError> {
        self.arith_input_my::<u8>(owner, num_simd)
    }

    fn make_arithmetic_16_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u16>, WireVector), EngineError> {
        self.arith_input_my::<u16>(owner, num_simd)
    }

    fn make_arithmetic_32_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u32>, WireVector), EngineError> {
        self.arith_input_my::<u32>(owner, num_simd)
    }

    fn make_arithmetic_64_input_gate_my(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<(InputPromise<u64>, WireVector), EngineError> {
        self.arith_input_my::<u64>(owner, num_simd)
    }

    fn make_arithmetic_8_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        self.arith_input_other::<u8>(owner, num_simd)
    }

    fn make_arithmetic_16_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        self.arith_input_other::<u16>(owner, num_simd)
    }

    fn make_arithmetic_32_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        self.arith_input_other::<u32>(owner, num_simd)
    }

    fn make_arithmetic_64_input_gate_other(
        &self,
        owner: PartyId,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        self.arith_input_other::<u64>(owner, num_simd)
    }

    fn make_arithmetic_8_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u8>, EngineError> {
        self.arith_output_my::<u8>(recipient, wires)
    }

    fn make_arithmetic_16_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u16>, EngineError> {
        self.arith_output_my::<u16>(recipient, wires)
    }

    fn make_arithmetic_32_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u32>, EngineError> {
        self.arith_output_my::<u32>(recipient, wires)
    }

    fn make_arithmetic_64_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<u64>, EngineError> {
        self.arith_output_my::<u64>(recipient, wires)
    }

    fn make_arithmetic_output_gate_other(
        &self,
        recipient: PartyId,
        wires: &[Wire],
    ) -> Result<(), EngineError> {
        if recipient == self.my_id() {
            return Err(self.role_mismatch());
        }
        match arith_bit_size(wires)? {
            8 => self.arith_output_other_typed::<u8>(recipient, wires),
            16 => self.arith_output_other_typed::<u16>(recipient, wires),
            32 => self.arith_output_other_typed::<u32>(recipient, wires),
            64 => self.arith_output_other_typed::<u64>(recipient, wires),
            bits => Err(EngineError::BitSizeMismatch(bits, 64)),
        }
    }

    fn make_boolean_input_gate_my(
        &self,
        owner: PartyId,
        num_wires: usize,
        num_simd: usize,
    ) -> Result<(InputPromise<BitVec>, WireVector), EngineError> {
        if owner != self.my_id() {
            return Err(self.role_mismatch());
        }
        let (promise, input) = oneshot::channel();
        let id = self.ctx.register.next_gate_id();
        let outputs: Vec<Arc<BooleanWire>> =
            (0..num_wires).map(|_| BooleanWire::new(num_simd)).collect();
        let result = wrap_boolean(&outputs);
        self.ctx
            .register
            .register_gate(Box::new(BooleanInputGateSender {
                id,
                ctx: Arc::clone(&self.ctx),
                num_simd,
                input: Some(input),
                outputs,
                masks: Vec::new(),
            }));
        Ok((promise, result))
    }

    fn make_boolean_input_gate_other(
        &self,
        owner: PartyId,
        num_wires: usize,
        num_simd: usize,
    ) -> Result<WireVector, EngineError> {
        if owner == self.my_id() {
            return Err(self.role_mismatch());
        }
        let id = self.ctx.register.next_gate_id();
        let outputs: Vec<Arc<BooleanWire>> =
            (0..num_wires).map(|_| BooleanWire::new(num_simd)).collect();
        let result = wrap_boolean(&outputs);
        self.ctx
            .register
            .register_gate(Box::new(BooleanInputGateReceiver {
                id,
                ctx: Arc::clone(&self.ctx),
                num_simd,
                outputs,
            }));
        Ok(result)
    }

    fn make_boolean_output_gate_my(
        &self,
        recipient: OutputRecipient,
        wires: &[Wire],
    ) -> Result<OutputFuture<BitVec>, EngineError> {
        if !recipient.includes(self.my_id()) {
            return Err(self.role_mismatch());
        }
        let inputs = boolean_wires(Operation::Xor, wires)?;
        let (sender, future) = oneshot::channel();
        let id = self.ctx.register.next_gate_id();
        self.ctx.register.register_gate(Box::new(BooleanOutputGate {
            id,
            ctx: Arc::clone(&self.ctx),
            inputs,
            recipient,
            result: Some(sender),
        }));
        Ok(future)
    }

    fn make_boolean_output_gate_other(
        &self,
        recipient: PartyId,
        wires: &[Wire],
    ) -> Result<(), EngineError> {
        if recipient == self.my_id() {
            return Err(self.role_mismatch());
        }
        let inputs = boolean_wires(Operation::Xor, wires)?;
        let id = self.ctx.register.next_gate_id();
        self.ctx.register.register_gate(Box::new(BooleanOutputGate {
            id,
            ctx: Arc::clone(&self.ctx),
            inputs,
            recipient: OutputRecipient::Party(recipient),
            result: None,
        }));
        Ok(())
    }

    fn make_unary_gate(
        &self,
        op: Operation,
        input: &[Wire],
    ) -> Result<WireVector, EngineError> {
        match op {
            Operation::Inv => self.boolean_unary(op, input),
            Operation::Neg | Operation::Sqr => self.arith_unary_dispatch(op, input),
            op => Err(EngineError::UnsupportedOperation {
                op,
                protocol: self.protocol(),
            }),
        }
    }

    fn make_binary_gate(
        &self,
        op: Operation,
        a: &[Wire],
        b: &[Wire],
    ) -> Result<WireVector, EngineError> {
        match op {
            Operation::Xor | Operation::And => self.boolean_binary(op, a, b),
            Operation::Add | Operation::Sub | Operation::Mul => {
                self.arith_binary_dispatch(op, a, b)
            }
            op => Err(EngineError::UnsupportedOperation {
                op,
                protocol: self.protocol(),
            }),
        }
    }

    fn convert(&self, target: Protocol, input: &[Wire]) -> Result<WireVector, EngineError> {
        let source = input
            .first()
            .ok_or(EngineError::WireCountMismatch {
                expected: 1,
                actual: 0,
            })?
            .protocol();
        match (source, target) {
            (source, target) if source == target => Ok(input.to_vec()),
            (Protocol::BooleanGmw, Protocol::ArithmeticGmw) => self.convert_to_arithmetic(input),
            (Protocol::ArithmeticGmw, Protocol::BooleanGmw) => self.convert_to_boolean(input),
            (from, to) => Err(EngineError::UnsupportedConversion { from, to }),
        }
    }
}

// ----------------------------------------------------------------------
// wire helpers
// ----------------------------------------------------------------------

fn single_arith_wire<T: GmwRing>(
    wires: &[Wire],
) -> Result<Arc<ArithmeticWire<T>>, EngineError> {
    if wires.len() != 1 {
        return Err(EngineError::WireCountMismatch {
            expected: 1,
            actual: wires.len(),
        });
    }
    T::unwrap_wire(&wires[0]).ok_or(EngineError::BitSizeMismatch(wires[0].bit_size(), T::BITS))
}

fn arith_bit_size(wires: &[Wire]) -> Result<usize, EngineError> {
    if wires.len() != 1 {
        return Err(EngineError::WireCountMismatch {
            expected: 1,
            actual: wires.len(),
        });
    }
    match &wires[0] {
        Wire::BooleanGmw(_) => Err(EngineError::UnsupportedConversion {
            from: Protocol::BooleanGmw,
            to: Protocol::ArithmeticGmw,
        }),
        wire => Ok(wire.bit_size()),
    }
}

fn boolean_wires(op: Operation, wires: &[Wire]) -> Result<Vec<Arc<BooleanWire>>, EngineError> {
    if wires.is_empty() {
        return Err(EngineError::WireCountMismatch {
            expected: 1,
            actual: 0,
        });
    }
    wires
        .iter()
        .map(|wire| match wire {
            Wire::BooleanGmw(inner) => Ok(Arc::clone(inner)),
            other => Err(EngineError::UnsupportedOperation {
                op,
                protocol: other.protocol(),
            }),
        })
        .collect()
}

fn wrap_boolean(wires: &[Arc<BooleanWire>]) -> WireVector {
    wires.iter().cloned().map(Wire::BooleanGmw).collect()
}

fn check_simd(a: &[Arc<BooleanWire>], b: &[Arc<BooleanWire>]) -> Result<usize, EngineError> {
    let num_simd = a[0].num_simd();
    if a.iter().chain(b).any(|wire| wire.num_simd() != num_simd) {
        return Err(EngineError::InternalInvariant(
            "operands have different SIMD widths".into(),
        ));
    }
    Ok(num_simd)
}

#[cfg(test)]
mod tests {
    use duet_comm::memory_transport_pair;
    use duet_ot::OtProvider;

    use super::*;

    async fn factory_pair() -> (GmwFactory, GmwFactory) {
        let (t0, t1) = memory_transport_pair();
        let (c0, c1) = tokio::join!(CommLayer::connect(t0, 0), CommLayer::connect(t1, 1));
        let build = |comm: CommLayer| {
            let ots = Arc::new(OtProvider::new(comm.clone()));
            let my_id = comm.my_id();
            GmwFactory::new(
                comm,
                Arc::new(GateRegister::new()),
                Arc::new(MtProvider::new(Arc::clone(&ots))),
                Arc::new(SpProvider::new(Arc::clone(&ots), my_id)),
                Arc::new(SbProvider::new(ots, my_id)),
            )
        };
        (build(c0.unwrap()), build(c1.unwrap()))
    }

    #[tokio::test]
    async fn test_input_gate_role_checks() {
        let (f0, _f1) = factory_pair().await;

        assert!(f0.make_arithmetic_32_input_gate_my(0, 1).is_ok());
        assert!(matches!(
            f0.make_arithmetic_32_input_gate_my(1, 1),
            Err(EngineError::ProtocolRoleMismatch { party: 0 })
        ));
        assert!(matches!(
            f0.make_boolean_input_gate_other(0, 8, 1),
            Err(EngineError::ProtocolRoleMismatch { party: 0 })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let (f0, _f1) = factory_pair().await;
        let (_p, arith) = f0.make_arithmetic_16_input_gate_my(0, 1).unwrap();
        let (_q, boolean) = f0.make_boolean_input_gate_my(0, 4, 1).unwrap();

        assert!(matches!(
            f0.make_unary_gate(Operation::Inv, &arith),
            Err(EngineError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            f0.make_binary_gate(Operation::Add, &boolean, &boolean),
            Err(EngineError::UnsupportedConversion { .. })
        ));
        assert!(matches!(
            f0.make_binary_gate(Operation::And, &arith, &arith),
            Err(EngineError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_bit_size_and_wire_count_checks() {
        let (f0, _f1) = factory_pair().await;
        let (_p, a16) = f0.make_arithmetic_16_input_gate_my(0, 1).unwrap();
        let (_q, a32) = f0.make_arithmetic_32_input_gate_my(0, 1).unwrap();
        let (_r, bits) = f0.make_boolean_input_gate_my(0, 4, 1).unwrap();

        assert!(matches!(
            f0.make_binary_gate(Operation::Add, &a16, &a32),
            Err(EngineError::BitSizeMismatch(16, 32))
        ));
        assert!(matches!(
            f0.make_binary_gate(Operation::Xor, &bits, &bits[..2].to_vec()),
            Err(EngineError::WireCountMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_conversions() {
        let (f0, _f1) = factory_pair().await;
        let (_p, boolean) = f0.make_boolean_input_gate_my(0, 16, 1).unwrap();

        assert!(matches!(
            f0.convert(Protocol::Yao, &boolean),
            Err(EngineError::UnsupportedConversion { .. })
        ));
        // Converting to the same protocol is the identity.
        assert_eq!(f0.convert(Protocol::BooleanGmw, &boolean).unwrap().len(), 16);
    }
}
